//! Data types used by the settlement engine and its storage backends.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
pub use tsg_common::{Amount, Currency, SwapStatus};
use tsg_common::{sqlite_text, Secret};

//--------------------------------------  CommissionRate  ------------------------------------------------------------
pub const DEFAULT_COMMISSION_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

#[derive(Debug, Clone, Error)]
#[error("Invalid commission rate: {0}. Rates must be at least 0 and less than 1")]
pub struct InvalidCommissionRate(String);

/// The fraction of a sale that the platform keeps, e.g. `0.05`. Always in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct CommissionRate(Decimal);

sqlite_text!(CommissionRate);

impl CommissionRate {
    pub fn new(rate: Decimal) -> Result<Self, InvalidCommissionRate> {
        if rate < Decimal::ZERO || rate >= Decimal::ONE {
            return Err(InvalidCommissionRate(rate.to_string()));
        }
        Ok(Self(rate))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// The commission on `amount` at this rate. No rounding is applied.
    pub fn commission_on(&self, amount: Amount) -> Amount {
        amount * self.0
    }
}

impl Default for CommissionRate {
    fn default() -> Self {
        Self(DEFAULT_COMMISSION_RATE)
    }
}

impl TryFrom<Decimal> for CommissionRate {
    type Error = InvalidCommissionRate;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CommissionRate> for Decimal {
    fn from(value: CommissionRate) -> Self {
        value.0
    }
}

impl FromStr for CommissionRate {
    type Err = InvalidCommissionRate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rate = Decimal::from_str(s.trim()).map_err(|e| InvalidCommissionRate(format!("{s}. {e}")))?;
        Self::new(rate)
    }
}

impl Display for CommissionRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

//--------------------------------------      Tenant        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    /// Where the tenant receives settlement in the reference currency
    pub wallet_address: Option<String>,
    pub commission_rate: CommissionRate,
    pub active: bool,
    /// Per-tenant symmetric key (base64) used to protect customer delivery addresses
    #[sqlx(try_from = "String")]
    pub encryption_key: Secret<String>,
    pub overdue_invoices: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// The settlement wallet, if one has been configured.
    pub fn wallet(&self) -> Option<&str> {
        self.wallet_address.as_deref().map(str::trim).filter(|w| !w.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub wallet_address: Option<String>,
    pub commission_rate: CommissionRate,
}

impl NewTenant {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), wallet_address: None, commission_rate: CommissionRate::default() }
    }

    pub fn with_wallet<S: Into<String>>(mut self, wallet: S) -> Self {
        self.wallet_address = Some(wallet.into());
        self
    }

    pub fn with_commission_rate(mut self, rate: CommissionRate) -> Self {
        self.commission_rate = rate;
        self
    }
}

//--------------------------------------      Product       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    /// Unit price in the reference currency
    pub price: Amount,
    pub inventory: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub tenant_id: i64,
    pub name: String,
    pub price: Amount,
    pub inventory: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(tenant_id: i64, name: S, price: Amount, inventory: i64) -> Self {
        Self { tenant_id, name: name.into(), price, inventory }
    }
}

//--------------------------------------  OrderStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
pub enum OrderStatusType {
    /// A reference-currency order awaiting on-chain confirmation
    Pending,
    /// An order paid in another coin, waiting for the swap to complete
    SwapPending,
    /// Payment has been received in full
    Paid,
    /// The tenant has shipped the goods
    Fulfilled,
    /// The order was cancelled, or its swap failed. Inventory has been restored.
    Cancelled,
    /// The order was never paid. Inventory has been restored.
    Expired,
}

impl OrderStatusType {
    /// States from which an order can still move.
    pub const NON_TERMINAL: [OrderStatusType; 3] =
        [OrderStatusType::Pending, OrderStatusType::SwapPending, OrderStatusType::Paid];
    /// States that hold reserved, unpaid inventory.
    pub const AWAITING_PAYMENT: [OrderStatusType; 2] = [OrderStatusType::Pending, OrderStatusType::SwapPending];
    /// States that count as a completed sale for commission purposes.
    pub const COMPLETED: [OrderStatusType; 2] = [OrderStatusType::Paid, OrderStatusType::Fulfilled];

    pub fn is_terminal(&self) -> bool {
        !Self::NON_TERMINAL.contains(self)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::SwapPending => write!(f, "SwapPending"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Fulfilled => write!(f, "Fulfilled"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
            OrderStatusType::Expired => write!(f, "Expired"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid status conversion: {0}")]
pub struct StatusConversionError(String);

impl FromStr for OrderStatusType {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "SwapPending" => Ok(Self::SwapPending),
            "Paid" => Ok(Self::Paid),
            "Fulfilled" => Ok(Self::Fulfilled),
            "Cancelled" => Ok(Self::Cancelled),
            "Expired" => Ok(Self::Expired),
            s => Err(StatusConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            Self::Pending
        })
    }
}

//--------------------------------------       Order        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub tenant_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// Unit price times quantity, in the reference currency
    pub total_price: Amount,
    /// Commission owed to the platform, in the reference currency, fixed when the order was created
    pub commission: Amount,
    /// The tenant's commission rate when the order was created
    pub commission_rate: CommissionRate,
    pub payment_currency: Currency,
    /// What the customer must send, in `payment_currency`
    pub payment_amount: Amount,
    pub payment_address: String,
    pub swap_id: Option<String>,
    pub swap_provider: Option<String>,
    pub swap_status: Option<SwapStatus>,
    pub swap_expires_at: Option<DateTime<Utc>>,
    /// Encrypted with the tenant's key
    pub delivery_address: String,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_swap(&self) -> bool {
        self.swap_id.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub tenant_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub total_price: Amount,
    pub commission: Amount,
    pub commission_rate: CommissionRate,
    pub payment_currency: Currency,
    pub payment_amount: Amount,
    pub payment_address: String,
    pub swap_id: Option<String>,
    pub swap_provider: Option<String>,
    pub swap_status: Option<SwapStatus>,
    pub swap_expires_at: Option<DateTime<Utc>>,
    pub delivery_address: String,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   InvoiceStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
    Waived,
}

impl InvoiceStatus {
    pub const OPEN: [InvoiceStatus; 2] = [InvoiceStatus::Pending, InvoiceStatus::Overdue];

    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Waived)
    }
}

impl Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvoiceStatus::Pending => write!(f, "Pending"),
            InvoiceStatus::Paid => write!(f, "Paid"),
            InvoiceStatus::Overdue => write!(f, "Overdue"),
            InvoiceStatus::Waived => write!(f, "Waived"),
        }
    }
}

/// The enforcement stage an overdue invoice has triggered against its tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Type)]
pub enum EnforcementTier {
    Suspended,
    Terminated,
}

impl EnforcementTier {
    pub fn audit_action(&self) -> AuditAction {
        match self {
            EnforcementTier::Suspended => AuditAction::TenantSuspendedNonpayment,
            EnforcementTier::Terminated => AuditAction::TenantTerminatedNonpayment,
        }
    }
}

impl Display for EnforcementTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnforcementTier::Suspended => write!(f, "Suspended"),
            EnforcementTier::Terminated => write!(f, "Terminated"),
        }
    }
}

//--------------------------------------  CommissionInvoice ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CommissionInvoice {
    pub id: i64,
    pub tenant_id: i64,
    /// Inclusive
    pub period_start: DateTime<Utc>,
    /// Exclusive
    pub period_end: DateTime<Utc>,
    pub order_count: i64,
    pub total_sales: Amount,
    /// The tenant's rate when the invoice was generated
    pub commission_rate: CommissionRate,
    pub commission_due: Amount,
    /// Sum of the commission recorded on each order in the period, for audit
    pub order_commission: Amount,
    pub payment_address: String,
    pub payment_id: String,
    pub amount_received: Amount,
    pub status: InvoiceStatus,
    pub enforcement: Option<EnforcementTier>,
    pub due_date: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub waiver_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommissionInvoice {
    /// Whole days since the due date. Zero or negative if the invoice is not yet due.
    pub fn days_overdue(&self, now: DateTime<Utc>) -> i64 {
        (now - self.due_date).num_days()
    }
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub tenant_id: i64,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub order_count: i64,
    pub total_sales: Amount,
    pub commission_rate: CommissionRate,
    pub commission_due: Amount,
    pub order_commission: Amount,
    pub payment_address: String,
    pub payment_id: String,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      Audit log     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    OrderCreated,
    OrderPaid,
    OrderCancelled,
    OrderExpired,
    OrderFulfilled,
    InvoiceGenerated,
    InvoicePaid,
    InvoiceWaived,
    TenantSuspendedNonpayment,
    TenantTerminatedNonpayment,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::OrderCreated => "order_created",
            AuditAction::OrderPaid => "order_paid",
            AuditAction::OrderCancelled => "order_cancelled",
            AuditAction::OrderExpired => "order_expired",
            AuditAction::OrderFulfilled => "order_fulfilled",
            AuditAction::InvoiceGenerated => "invoice_generated",
            AuditAction::InvoicePaid => "invoice_paid",
            AuditAction::InvoiceWaived => "invoice_waived",
            AuditAction::TenantSuspendedNonpayment => "tenant_suspended_nonpayment",
            AuditAction::TenantTerminatedNonpayment => "tenant_terminated_nonpayment",
        }
    }
}

impl Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An append-only record of a significant state change.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub tenant_id: Option<i64>,
    pub action: String,
    /// JSON object
    pub details: String,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn details_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.details).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub tenant_id: Option<i64>,
    pub action: AuditAction,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl NewAuditEntry {
    pub fn new(tenant_id: i64, action: AuditAction, details: serde_json::Value, created_at: DateTime<Utc>) -> Self {
        Self { tenant_id: Some(tenant_id), action, details, created_at }
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn commission_rates() {
        assert_eq!(CommissionRate::default().value(), dec!(0.05));
        assert!(CommissionRate::new(dec!(1)).is_err());
        assert!(CommissionRate::new(dec!(-0.01)).is_err());
        let rate: CommissionRate = "0.10".parse().unwrap();
        assert_eq!(rate.commission_on(Amount::from(dec!(50.0))), Amount::from(dec!(5.0)));
        assert!("ten percent".parse::<CommissionRate>().is_err());
    }

    #[test]
    fn order_status_classification() {
        assert!(!OrderStatusType::Paid.is_terminal());
        assert!(!OrderStatusType::SwapPending.is_terminal());
        assert!(OrderStatusType::Fulfilled.is_terminal());
        assert!(OrderStatusType::Expired.is_terminal());
        assert_eq!("SwapPending".parse::<OrderStatusType>().unwrap(), OrderStatusType::SwapPending);
        assert_eq!(OrderStatusType::from("garbage".to_string()), OrderStatusType::Pending);
        assert!(InvoiceStatus::Waived.is_terminal());
        assert!(!InvoiceStatus::Overdue.is_terminal());
        assert!(EnforcementTier::Terminated > EnforcementTier::Suspended);
    }

    #[test]
    fn audit_action_names() {
        assert_eq!(AuditAction::TenantTerminatedNonpayment.to_string(), "tenant_terminated_nonpayment");
        assert_eq!(serde_json::to_string(&AuditAction::InvoiceWaived).unwrap(), "\"invoice_waived\"");
    }
}
