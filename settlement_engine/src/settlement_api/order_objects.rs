use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tsg_common::{Amount, Currency, SwapStatus};

use crate::db_types::{Order, OrderStatusType};

/// What a customer needs to know to pay for a freshly created order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: i64,
    pub order: Order,
    pub payment_address: String,
    pub payment_amount: Amount,
    pub payment_currency: Currency,
    /// In the reference currency
    pub total_price: Amount,
    /// In the reference currency
    pub commission: Amount,
    pub swap_status: Option<SwapStatus>,
    /// Human-readable payment instructions
    pub message: String,
}

impl OrderResult {
    pub fn new(order: Order) -> Self {
        let message = payment_message(&order);
        Self {
            order_id: order.id,
            payment_address: order.payment_address.clone(),
            payment_amount: order.payment_amount,
            payment_currency: order.payment_currency,
            total_price: order.total_price,
            commission: order.commission,
            swap_status: order.swap_status,
            message,
            order,
        }
    }
}

fn payment_message(order: &Order) -> String {
    if order.payment_currency.is_reference() {
        format!(
            "Please send exactly {} XMR to:\n\n`{}`\n\nYour order will be processed once payment is confirmed.",
            order.payment_amount, order.payment_address
        )
    } else {
        format!(
            "Please send {} {} to:\n\n`{}`\n\nThis will be automatically converted to {} XMR.\nYour order will be \
             processed once the swap is complete.",
            order.payment_amount,
            order.payment_currency.code(),
            order.payment_address,
            order.total_price
        )
    }
}

/// The outcome of checking an order's payment status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCheckResult {
    pub order_id: i64,
    pub state: OrderStatusType,
    pub swap_status: Option<SwapStatus>,
    pub message: String,
    /// True if this check moved the order to a new state
    pub changed: bool,
}

impl PaymentCheckResult {
    /// A result describing the order as it stands, without having consulted a swap provider.
    pub fn unchanged(order: &Order) -> Self {
        let message = match order.status {
            OrderStatusType::Pending => "Awaiting payment.".to_string(),
            OrderStatusType::SwapPending => match order.swap_status {
                Some(s) => format!("Swap in progress: {s}"),
                None => "Swap in progress.".to_string(),
            },
            OrderStatusType::Paid => "Payment received! Order is being processed.".to_string(),
            OrderStatusType::Fulfilled => "Order has been fulfilled.".to_string(),
            OrderStatusType::Cancelled => "Order was cancelled.".to_string(),
            OrderStatusType::Expired => "Order expired before payment was received.".to_string(),
        };
        Self { order_id: order.id, state: order.status, swap_status: order.swap_status, message, changed: false }
    }

    pub fn after_swap_update(order: &Order, changed: bool) -> Self {
        let message = match order.swap_status {
            Some(SwapStatus::Complete) => "Payment received! Order is being processed.".to_string(),
            Some(s) if s.is_failure() => "Payment failed or expired.".to_string(),
            Some(s) => format!("Swap in progress: {s}"),
            None => "Swap in progress.".to_string(),
        };
        Self { order_id: order.id, state: order.status, swap_status: order.swap_status, message, changed }
    }
}

/// The outcome of one pass over every `SwapPending` order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPollReport {
    pub checked: usize,
    pub completed: usize,
    pub failed: usize,
    /// Orders whose status could not be determined this pass. They are retried on the next one.
    pub errors: usize,
}

impl Display for SwapPollReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} swaps checked, {} completed, {} failed, {} errors",
            self.checked, self.completed, self.failed, self.errors
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResult {
    pub order: Order,
    /// False if the order was already in a terminal state
    pub changed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpiryReport {
    pub expired: Vec<i64>,
    pub errors: usize,
}

/// A non-binding price preview. `payment_amount` is `None` when no fresh display rates are held.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePreview {
    pub product_id: i64,
    pub quantity: i64,
    pub total_price: Amount,
    pub payment_currency: Currency,
    pub payment_amount: Option<Amount>,
}
