use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use rust_decimal::Decimal;
use tsg_common::{Amount, Currency, SwapQuote, SwapStatus};

use crate::{
    db_types::{NewOrder, Order, OrderStatusType},
    events::{EventProducers, OrderAnnulledEvent, OrderPaidEvent},
    helpers::{decrypt_address, encrypt_address},
    order_objects::{CancelResult, ExpiryReport, OrderResult, PaymentCheckResult, PricePreview, SwapPollReport},
    settlement_api::{conversion_api::CurrencyConverter, errors::OrderFlowError},
    traits::{ExchangeRates, SettlementDatabase, SwapExchange},
};

/// How long, in hours, an order may wait for payment before the expiry sweep returns its stock.
pub const DEFAULT_UNPAID_ORDER_TIMEOUT_HOURS: i64 = 48;

/// `OrderFlowApi` is the primary API for creating orders and driving them through their lifecycle.
///
/// Orders paid in the reference currency start out `Pending` and are paid directly into the tenant's wallet. Orders
/// paid in any other coin start out `SwapPending`: the customer pays into a swap provider's deposit address, and the
/// provider forwards the reference currency to the tenant. The swap's progress is tracked by polling the provider
/// with [`Self::check_order_payment`] or [`Self::process_pending_swaps`].
///
/// Apart from [`Self::create_order`], the per-order methods take an order id only and do not check which tenant is
/// asking. Callers acting for a tenant must confirm that the tenant owns the order first.
pub struct OrderFlowApi<B, R, S> {
    db: B,
    converter: CurrencyConverter<R>,
    swaps: S,
    producers: EventProducers,
}

impl<B, R, S> Debug for OrderFlowApi<B, R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, R, S> OrderFlowApi<B, R, S> {
    pub fn new(db: B, converter: CurrencyConverter<R>, swaps: S, producers: EventProducers) -> Self {
        Self { db, converter, swaps, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn converter(&self) -> &CurrencyConverter<R> {
        &self.converter
    }
}

impl<B, R, S> OrderFlowApi<B, R, S>
where
    B: SettlementDatabase,
    R: ExchangeRates,
    S: SwapExchange,
{
    /// Creates an order for `quantity` units of a product, paid for in `payment_currency`.
    ///
    /// The checks below run in order, and the first one to fail determines the error:
    /// 1. the payment currency is a supported coin,
    /// 2. the quantity is positive,
    /// 3. the tenant exists, is active and has a settlement wallet,
    /// 4. the product exists, belongs to the tenant and is active,
    /// 5. there is enough stock.
    ///
    /// The stock check here is advisory. The authoritative check is the reservation that happens in the same
    /// transaction as the order insert, so two customers racing for the last unit cannot both succeed. The loser gets
    /// [`OrderFlowError::InventoryConflict`].
    ///
    /// For swap payments the provider is called before the reservation. If the reservation then fails, the swap is
    /// simply never funded and expires at the provider.
    pub async fn create_order(
        &self,
        tenant_id: i64,
        product_id: i64,
        quantity: i64,
        delivery_address: &str,
        payment_currency: &str,
    ) -> Result<OrderResult, OrderFlowError> {
        let currency = Currency::parse_payment_currency(payment_currency)?;
        if quantity <= 0 {
            return Err(OrderFlowError::InvalidQuantity(quantity));
        }
        let tenant = self.db.fetch_tenant(tenant_id).await?.ok_or(OrderFlowError::TenantNotFound(tenant_id))?;
        if !tenant.active {
            return Err(OrderFlowError::TenantInactive(tenant_id));
        }
        let wallet = tenant.wallet().ok_or(OrderFlowError::TenantWalletMissing(tenant_id))?.to_string();
        let product = self
            .db
            .fetch_product(product_id)
            .await?
            .filter(|p| p.tenant_id == tenant_id)
            .ok_or(OrderFlowError::ProductNotFound(product_id))?;
        if !product.active {
            return Err(OrderFlowError::ProductInactive(product_id));
        }
        if product.inventory < quantity {
            return Err(OrderFlowError::InsufficientInventory { requested: quantity, available: product.inventory });
        }

        let total_price = order_total(product.price, product_id, quantity)?;
        let commission_rate = tenant.commission_rate;
        let commission = commission_rate.commission_on(total_price);
        let encrypted_address = encrypt_address(delivery_address, tenant.encryption_key.reveal())?;
        let now = Utc::now();

        let mut order = NewOrder {
            tenant_id,
            product_id,
            quantity,
            total_price,
            commission,
            commission_rate,
            payment_currency: currency,
            payment_amount: total_price,
            payment_address: wallet.clone(),
            swap_id: None,
            swap_provider: None,
            swap_status: None,
            swap_expires_at: None,
            delivery_address: encrypted_address,
            status: OrderStatusType::Pending,
            created_at: now,
        };
        if !currency.is_reference() {
            let payment_amount = self.converter.convert_currency(total_price, Currency::REFERENCE, currency).await?;
            let swap = self.swaps.create_swap(currency, payment_amount, &wallet, None).await?;
            debug!(
                "🔄️ {} swap {} will deliver {} XMR for an order of {total_price} XMR",
                swap.provider, swap.swap_id, swap.expected_amount
            );
            order.payment_amount = payment_amount;
            order.payment_address = swap.deposit_address;
            order.swap_id = Some(swap.swap_id);
            order.swap_provider = Some(swap.provider);
            order.swap_status = Some(swap.status);
            order.swap_expires_at = Some(swap.expires_at);
            order.status = OrderStatusType::SwapPending;
        }

        let order = self.db.insert_order_with_reservation(order).await?;
        info!(
            "🔄️ Order #{} created for tenant #{tenant_id}: {quantity}x {} = {total_price} XMR (paying in {})",
            order.id,
            product.name,
            currency.code()
        );
        Ok(OrderResult::new(order))
    }

    /// Checks on the payment for an order.
    ///
    /// For `SwapPending` orders, the swap provider is asked for the current status and the order is updated to match.
    /// Any other order is described as it stands. A provider that cannot be reached is an error, and the order is
    /// left untouched.
    pub async fn check_order_payment(&self, order_id: i64) -> Result<PaymentCheckResult, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        if order.status != OrderStatusType::SwapPending {
            return Ok(PaymentCheckResult::unchanged(&order));
        }
        self.poll_swap(order).await
    }

    /// Polls every `SwapPending` order once. One order failing never prevents the others from being checked.
    pub async fn process_pending_swaps(&self) -> Result<SwapPollReport, OrderFlowError> {
        let pending = self.db.fetch_orders_by_status(&[OrderStatusType::SwapPending]).await?;
        let mut report = SwapPollReport::default();
        for order in pending {
            report.checked += 1;
            let id = order.id;
            match self.poll_swap(order).await {
                Ok(result) if result.changed && result.state == OrderStatusType::Paid => report.completed += 1,
                Ok(result) if result.changed && result.state == OrderStatusType::Cancelled => report.failed += 1,
                Ok(_) => {},
                Err(e) => {
                    warn!("🔄️ Could not check the swap for order #{id}. {e}");
                    report.errors += 1;
                },
            }
        }
        if report.checked > 0 {
            info!("🔄️ Swap poll complete. {report}");
        }
        Ok(report)
    }

    async fn poll_swap(&self, order: Order) -> Result<PaymentCheckResult, OrderFlowError> {
        let (Some(swap_id), Some(provider)) = (order.swap_id.as_deref(), order.swap_provider.as_deref()) else {
            error!("🔄️ Order #{} is SwapPending but has no swap details", order.id);
            return Err(OrderFlowError::SwapDetailsMissing(order.id));
        };
        let status = self.swaps.check_status(swap_id, provider).await?;
        trace!("🔄️ {provider} reports swap {swap_id} for order #{} is {status}", order.id);
        self.apply_swap_status(order, status).await
    }

    /// Moves a `SwapPending` order to the state implied by its swap's status. The swap status and the order state are
    /// written in the same update.
    async fn apply_swap_status(&self, order: Order, status: SwapStatus) -> Result<PaymentCheckResult, OrderFlowError> {
        let now = Utc::now();
        let updated = if status == SwapStatus::Complete {
            let paid = self.db.mark_order_paid(order.id, Some(status), now).await?;
            if let Some(o) = &paid {
                info!("🔄️ Swap for order #{} is complete. The order is paid", o.id);
                self.producers.publish_order_paid(OrderPaidEvent::new(o.clone())).await;
            }
            paid
        } else if status.is_failure() || order.swap_expires_at.is_some_and(|t| t < now) {
            let swap_status = if status.is_failure() { status } else { SwapStatus::Expired };
            let annulled = self.db.annul_order(order.id, OrderStatusType::Cancelled, Some(swap_status), now).await?;
            if let Some(o) = &annulled {
                warn!("🔄️ Swap for order #{} is {swap_status}. The order is cancelled and its stock restored", o.id);
                self.producers.publish_order_annulled(OrderAnnulledEvent::new(o.clone())).await;
            }
            annulled
        } else if order.swap_status != Some(status) {
            self.db.update_swap_status(order.id, status, now).await?
        } else {
            return Ok(PaymentCheckResult::after_swap_update(&order, false));
        };
        match updated {
            Some(o) => Ok(PaymentCheckResult::after_swap_update(&o, true)),
            None => {
                // Someone else moved the order on first
                let current = self.fetch_order(order.id).await?;
                debug!("🔄️ Order #{} changed to {} while its swap was being checked", current.id, current.status);
                Ok(PaymentCheckResult::unchanged(&current))
            },
        }
    }

    /// Marks a direct (reference currency) order as paid once the payment has been observed on chain.
    pub async fn confirm_payment(&self, order_id: i64) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        if order.status != OrderStatusType::Pending {
            return Err(OrderFlowError::IllegalTransition { from: order.status, to: OrderStatusType::Paid });
        }
        match self.db.mark_order_paid(order_id, None, Utc::now()).await? {
            Some(paid) => {
                info!("🔄️ Payment for order #{order_id} confirmed");
                self.producers.publish_order_paid(OrderPaidEvent::new(paid.clone())).await;
                Ok(paid)
            },
            None => {
                let current = self.fetch_order(order_id).await?;
                Err(OrderFlowError::IllegalTransition { from: current.status, to: OrderStatusType::Paid })
            },
        }
    }

    /// `Paid` → `Fulfilled`. Called when the tenant ships the order.
    pub async fn mark_fulfilled(&self, order_id: i64) -> Result<Order, OrderFlowError> {
        match self.db.mark_order_fulfilled(order_id, Utc::now()).await? {
            Some(order) => {
                info!("🔄️ Order #{order_id} fulfilled");
                Ok(order)
            },
            None => {
                let current = self.fetch_order(order_id).await?;
                Err(OrderFlowError::IllegalTransition { from: current.status, to: OrderStatusType::Fulfilled })
            },
        }
    }

    /// Cancels an order and returns its stock. Cancelling an order that is already in a terminal state is a no-op,
    /// and the order is returned as it is.
    pub async fn cancel_order(&self, order_id: i64) -> Result<CancelResult, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        if order.status.is_terminal() {
            debug!("🔄️ Order #{order_id} is already {}. Nothing to cancel", order.status);
            return Ok(CancelResult { order, changed: false });
        }
        match self.db.annul_order(order_id, OrderStatusType::Cancelled, None, Utc::now()).await? {
            Some(cancelled) => {
                info!("🔄️ Order #{order_id} cancelled. {} units returned to stock", cancelled.quantity);
                self.producers.publish_order_annulled(OrderAnnulledEvent::new(cancelled.clone())).await;
                Ok(CancelResult { order: cancelled, changed: true })
            },
            None => {
                let current = self.fetch_order(order_id).await?;
                Ok(CancelResult { order: current, changed: false })
            },
        }
    }

    /// Expires every order that has been waiting for payment for longer than `timeout`, and returns its stock.
    ///
    /// Direct `Pending` orders expire too, even though their payment is only ever observed through
    /// [`Self::confirm_payment`]. A tenant that confirms a direct payment after the timeout gets
    /// [`OrderFlowError::IllegalTransition`] and has to settle with the customer outside the engine.
    pub async fn expire_unpaid_orders(&self, timeout: Duration) -> Result<ExpiryReport, OrderFlowError> {
        let now = Utc::now();
        let stale = self.db.fetch_unpaid_orders_created_before(now - timeout).await?;
        let mut report = ExpiryReport::default();
        for order in stale {
            let swap_status = order.swap_status.map(|_| SwapStatus::Expired);
            match self.db.annul_order(order.id, OrderStatusType::Expired, swap_status, now).await {
                Ok(Some(expired)) => {
                    info!("🔄️ Order #{} expired without payment", expired.id);
                    report.expired.push(expired.id);
                    self.producers.publish_order_annulled(OrderAnnulledEvent::new(expired)).await;
                },
                Ok(None) => trace!("🔄️ Order #{} was settled before it could expire", order.id),
                Err(e) => {
                    error!("🔄️ Could not expire order #{}. {e}", order.id);
                    report.errors += 1;
                },
            }
        }
        Ok(report)
    }

    /// A non-binding price in `currency` for `quantity` units of a product, from the display rate cache only.
    pub async fn preview_price(
        &self,
        product_id: i64,
        quantity: i64,
        currency: &str,
    ) -> Result<PricePreview, OrderFlowError> {
        let payment_currency = currency.parse::<Currency>()?;
        if quantity <= 0 {
            return Err(OrderFlowError::InvalidQuantity(quantity));
        }
        let product = self.db.fetch_product(product_id).await?.ok_or(OrderFlowError::ProductNotFound(product_id))?;
        let total_price = order_total(product.price, product_id, quantity)?;
        let payment_amount = self.converter.convert_cached_currency(
            total_price,
            Currency::REFERENCE,
            payment_currency,
            Utc::now(),
        )?;
        Ok(PricePreview { product_id, quantity, total_price, payment_currency, payment_amount })
    }

    /// A swap quote for paying `amount` of `currency`. Quotes are informational and are never persisted.
    pub async fn quote(&self, currency: &str, amount: Amount) -> Result<SwapQuote, OrderFlowError> {
        let currency = Currency::parse_payment_currency(currency)?;
        let quote = self.swaps.quote(currency, amount).await?;
        Ok(quote)
    }

    pub async fn fetch_order(&self, order_id: i64) -> Result<Order, OrderFlowError> {
        self.db.fetch_order(order_id).await?.ok_or(OrderFlowError::OrderNotFound(order_id))
    }

    pub async fn orders_for_tenant(&self, tenant_id: i64) -> Result<Vec<Order>, OrderFlowError> {
        let orders = self.db.fetch_orders_for_tenant(tenant_id).await?;
        Ok(orders)
    }

    /// Decrypts the customer's delivery address with the owning tenant's key.
    pub async fn decrypt_delivery_address(&self, order_id: i64) -> Result<String, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        let tenant =
            self.db.fetch_tenant(order.tenant_id).await?.ok_or(OrderFlowError::TenantNotFound(order.tenant_id))?;
        let address = decrypt_address(&order.delivery_address, tenant.encryption_key.reveal())?;
        Ok(address)
    }
}

fn order_total(price: Amount, product_id: i64, quantity: i64) -> Result<Amount, OrderFlowError> {
    price.checked_mul(Decimal::from(quantity)).ok_or(OrderFlowError::TotalOverflow { product_id, quantity })
}
