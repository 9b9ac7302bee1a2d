use std::fmt::Debug;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use log::*;
use tsg_common::{Amount, Currency};

use crate::{
    commission_objects::{InvoiceGenerationReport, InvoicePaymentResult, OverdueReport, PlatformRevenue},
    db_types::{CommissionInvoice, EnforcementTier, InvoiceStatus, NewInvoice, Tenant},
    events::{EventProducers, TenantDeactivatedEvent},
    helpers::random_payment_id,
    settlement_api::errors::CommissionError,
    traits::{CommissionManagement, PaymentReceipts},
};

/// Days after generation that an invoice falls due.
pub const INVOICE_DUE_DAYS: i64 = 7;
/// Days overdue after which the tenant is suspended.
pub const SUSPENSION_DAYS: i64 = 7;
/// Days overdue after which the tenant is terminated.
pub const TERMINATION_DAYS: i64 = 14;

/// The seven days ending at the most recent UTC midnight, as a half-open `[start, end)` period.
pub fn weekly_period(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (end - Duration::days(7), end)
}

/// The enforcement tier an invoice this far overdue calls for, if any. The harshest matching tier wins.
pub fn enforcement_tier_for(days_overdue: i64) -> Option<EnforcementTier> {
    if days_overdue >= TERMINATION_DAYS {
        Some(EnforcementTier::Terminated)
    } else if days_overdue >= SUSPENSION_DAYS {
        Some(EnforcementTier::Suspended)
    } else {
        None
    }
}

/// `CommissionApi` bills tenants for the platform's commission and enforces payment.
///
/// Each week, every active tenant with completed sales receives an invoice for `total sales × commission rate`, using
/// the tenant's rate at generation time. Invoices are due a week later. Unpaid invoices turn `Overdue`, and the
/// tenant is suspended after [`SUSPENSION_DAYS`] and terminated after [`TERMINATION_DAYS`]. Both deactivate the
/// tenant; the difference is recorded in the audit log.
pub struct CommissionApi<B> {
    db: B,
    platform_wallet: String,
    producers: EventProducers,
}

impl<B> Debug for CommissionApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CommissionApi")
    }
}

impl<B> CommissionApi<B> {
    pub fn new(db: B, platform_wallet: String, producers: EventProducers) -> Self {
        Self { db, platform_wallet, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> CommissionApi<B>
where B: CommissionManagement
{
    /// Generates invoices for the week ending at the most recent UTC midnight.
    pub async fn generate_invoices(&self) -> Result<InvoiceGenerationReport, CommissionError> {
        let now = Utc::now();
        let (start, end) = weekly_period(now);
        self.generate_invoices_at(start, end, now).await
    }

    /// Generates an invoice for every active tenant with completed sales in `[start, end)`. `now` is the generation
    /// time, from which the due date is set.
    ///
    /// Tenants without sales are skipped. A tenant that cannot be invoiced, e.g. because it already has an invoice for
    /// an overlapping period, is recorded in the report's failures and the remaining tenants are still processed.
    pub async fn generate_invoices_at(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<InvoiceGenerationReport, CommissionError> {
        if start >= end {
            return Err(CommissionError::InvalidPeriod);
        }
        let tenants = self.db.fetch_active_tenants().await?;
        debug!("🧾️ Generating invoices for {} active tenants, {start} to {end}", tenants.len());
        let mut report = InvoiceGenerationReport::default();
        for tenant in tenants {
            match self.invoice_tenant(&tenant, start, end, now).await {
                Ok(Some(invoice)) => {
                    info!(
                        "🧾️ Invoice #{} for tenant #{}: {} orders, {} XMR sales, {} XMR due by {}",
                        invoice.id,
                        tenant.id,
                        invoice.order_count,
                        invoice.total_sales,
                        invoice.commission_due,
                        invoice.due_date
                    );
                    report.created.push(invoice);
                },
                Ok(None) => trace!("🧾️ Tenant #{} owes no commission for the period. No invoice", tenant.id),
                Err(e) => {
                    warn!("🧾️ Could not invoice tenant #{}. {e}", tenant.id);
                    report.failures.push((tenant.id, e.to_string()));
                },
            }
        }
        Ok(report)
    }

    async fn invoice_tenant(
        &self,
        tenant: &Tenant,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<CommissionInvoice>, CommissionError> {
        let orders = self.db.fetch_completed_orders(tenant.id, start, end).await?;
        let total_sales = orders.iter().map(|o| o.total_price).sum::<Amount>();
        if !total_sales.is_positive() {
            return Ok(None);
        }
        let order_commission = orders.iter().map(|o| o.commission).sum::<Amount>();
        let commission_due =
            tenant.commission_rate.commission_on(total_sales).round_down(Currency::REFERENCE.precision());
        if !commission_due.is_positive() {
            debug!("🧾️ Tenant #{} owes no commission on {total_sales} XMR of sales. No invoice", tenant.id);
            return Ok(None);
        }
        let invoice = NewInvoice {
            tenant_id: tenant.id,
            period_start: start,
            period_end: end,
            order_count: orders.len() as i64,
            total_sales,
            commission_rate: tenant.commission_rate,
            commission_due,
            order_commission,
            payment_address: self.platform_wallet.clone(),
            payment_id: random_payment_id(),
            due_date: now + Duration::days(INVOICE_DUE_DAYS),
            created_at: now,
        };
        let invoice = self.db.insert_invoice(invoice).await?;
        Ok(Some(invoice))
    }

    /// Records a payment of `received` against an invoice. The invoice is `Paid` if `received` covers the commission
    /// due; overpayment is accepted. Underpayment is recorded, and the invoice stays as it was.
    pub async fn check_invoice_payment(
        &self,
        invoice_id: i64,
        received: Amount,
    ) -> Result<InvoicePaymentResult, CommissionError> {
        if !received.is_positive() {
            return Err(CommissionError::NonPositiveAmount(received));
        }
        let invoice = self.fetch_invoice(invoice_id).await?;
        if invoice.status.is_terminal() {
            return Err(CommissionError::InvoiceClosed { id: invoice_id, status: invoice.status });
        }
        let paid = received >= invoice.commission_due;
        let updated = self
            .db
            .record_invoice_payment(invoice_id, invoice.status, received, paid, Utc::now())
            .await?
            .ok_or(CommissionError::ConcurrentModification(invoice_id))?;
        if paid {
            info!("🧾️ Invoice #{invoice_id} paid. Received {received} XMR against {} XMR due", updated.commission_due);
        } else {
            info!(
                "🧾️ Invoice #{invoice_id} underpaid. Received {received} XMR against {} XMR due",
                updated.commission_due
            );
        }
        Ok(InvoicePaymentResult { invoice: updated, paid })
    }

    pub async fn process_overdue_invoices(&self) -> Result<OverdueReport, CommissionError> {
        self.process_overdue_invoices_at(Utc::now()).await
    }

    /// Sweeps `Pending` invoices past their due date into `Overdue`, then applies the enforcement tier each `Overdue`
    /// invoice calls for. A tier is applied at most once per invoice.
    pub async fn process_overdue_invoices_at(&self, now: DateTime<Utc>) -> Result<OverdueReport, CommissionError> {
        let mut report = OverdueReport::default();
        let newly_overdue = self.db.mark_overdue_invoices(now).await?;
        for invoice in &newly_overdue {
            info!("🧾️ Invoice #{} for tenant #{} is overdue", invoice.id, invoice.tenant_id);
        }
        report.marked_overdue = newly_overdue.iter().map(|i| i.id).collect();

        let overdue = self.db.fetch_invoices_by_status(&[InvoiceStatus::Overdue]).await?;
        for invoice in overdue {
            let days = invoice.days_overdue(now);
            let Some(tier) = enforcement_tier_for(days) else {
                continue;
            };
            if invoice.enforcement.is_some_and(|current| current >= tier) {
                continue;
            }
            match self.db.escalate_enforcement(invoice.id, tier, days, now).await {
                Ok(Some(escalated)) => {
                    warn!(
                        "🧾️ Tenant #{} {} for non-payment of invoice #{} ({days} days overdue)",
                        escalated.tenant_id,
                        tier.to_string().to_lowercase(),
                        escalated.id
                    );
                    match tier {
                        EnforcementTier::Suspended => report.suspended.push(escalated.tenant_id),
                        EnforcementTier::Terminated => report.terminated.push(escalated.tenant_id),
                    }
                    let event = TenantDeactivatedEvent::new(escalated.tenant_id, escalated.id, tier);
                    self.producers.publish_tenant_deactivated(event).await;
                },
                Ok(None) => trace!("🧾️ Invoice #{} was settled or escalated concurrently", invoice.id),
                Err(e) => error!("🧾️ Could not apply {tier} to tenant #{}. {e}", invoice.tenant_id),
            }
        }
        Ok(report)
    }

    /// Administrative override. Moves any open invoice to `Waived`.
    pub async fn waive_invoice(&self, invoice_id: i64, reason: &str) -> Result<CommissionInvoice, CommissionError> {
        let invoice = self.fetch_invoice(invoice_id).await?;
        if invoice.status.is_terminal() {
            return Err(CommissionError::InvoiceClosed { id: invoice_id, status: invoice.status });
        }
        let waived = self
            .db
            .waive_invoice(invoice_id, invoice.status, reason, Utc::now())
            .await?
            .ok_or(CommissionError::ConcurrentModification(invoice_id))?;
        info!("🧾️ Invoice #{invoice_id} waived: {reason}");
        Ok(waived)
    }

    /// Commission collected on invoices paid in `[start, end)`, and what is currently outstanding.
    pub async fn calculate_platform_revenue(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PlatformRevenue, CommissionError> {
        if start >= end {
            return Err(CommissionError::InvalidPeriod);
        }
        let paid = self.db.fetch_invoices_paid_between(start, end).await?;
        let open = self.db.fetch_invoices_by_status(&InvoiceStatus::OPEN).await?;
        Ok(PlatformRevenue {
            total_commission: paid.iter().map(|i| i.commission_due).sum(),
            paid_invoices: paid.len(),
            outstanding_invoices: open.len(),
            outstanding_amount: open.iter().map(|i| i.commission_due).sum(),
        })
    }

    /// Checks every open invoice against the payments the platform wallet has received for its payment id. Returns
    /// the number of invoices that became `Paid`. Invoices whose receipts cannot be read are skipped until next time.
    pub async fn reconcile_invoice_payments<P: PaymentReceipts>(&self, receipts: &P) -> Result<usize, CommissionError> {
        let open = self.db.fetch_invoices_by_status(&InvoiceStatus::OPEN).await?;
        let mut paid = 0;
        for invoice in open {
            let received = match receipts.received_for_payment_id(&invoice.payment_id).await {
                Ok(amount) => amount,
                Err(e) => {
                    warn!("🧾️ Could not read payments for invoice #{}. {e}", invoice.id);
                    continue;
                },
            };
            if !received.is_positive() || received == invoice.amount_received {
                continue;
            }
            match self.check_invoice_payment(invoice.id, received).await {
                Ok(result) if result.paid => paid += 1,
                Ok(_) => {},
                Err(e) => warn!("🧾️ Could not record payment for invoice #{}. {e}", invoice.id),
            }
        }
        Ok(paid)
    }

    pub async fn fetch_invoice(&self, invoice_id: i64) -> Result<CommissionInvoice, CommissionError> {
        self.db.fetch_invoice(invoice_id).await?.ok_or(CommissionError::InvoiceNotFound(invoice_id))
    }

    pub async fn invoices_for_tenant(&self, tenant_id: i64) -> Result<Vec<CommissionInvoice>, CommissionError> {
        let invoices = self.db.fetch_invoices_for_tenant(tenant_id).await?;
        Ok(invoices)
    }

    pub async fn open_invoices(&self) -> Result<Vec<CommissionInvoice>, CommissionError> {
        let invoices = self.db.fetch_invoices_by_status(&InvoiceStatus::OPEN).await?;
        Ok(invoices)
    }
}
