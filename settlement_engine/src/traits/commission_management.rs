use chrono::{DateTime, Utc};

use crate::{
    db_types::{Amount, CommissionInvoice, EnforcementTier, InvoiceStatus, NewInvoice, Order},
    traits::{SettlementDatabase, StoreError},
};

#[allow(async_fn_in_trait)]
pub trait CommissionManagement: SettlementDatabase {
    /// Orders for the tenant that are `Paid` or `Fulfilled` and were paid in `[start, end)`.
    async fn fetch_completed_orders(
        &self,
        tenant_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError>;

    /// Inserts the invoice and writes an `invoice_generated` audit entry.
    ///
    /// Fails with [`StoreError::OverlappingInvoicePeriod`] if the tenant already has an invoice whose period
    /// intersects `[period_start, period_end)`.
    async fn insert_invoice(&self, invoice: NewInvoice) -> Result<CommissionInvoice, StoreError>;

    async fn fetch_invoice(&self, invoice_id: i64) -> Result<Option<CommissionInvoice>, StoreError>;

    async fn fetch_invoices_by_status(&self, statuses: &[InvoiceStatus]) -> Result<Vec<CommissionInvoice>, StoreError>;

    async fn fetch_invoices_for_tenant(&self, tenant_id: i64) -> Result<Vec<CommissionInvoice>, StoreError>;

    /// Moves every `Pending` invoice whose due date is before `now` to `Overdue`, and bumps each affected tenant's
    /// overdue-invoice count. Returns the invoices that changed.
    async fn mark_overdue_invoices(&self, now: DateTime<Utc>) -> Result<Vec<CommissionInvoice>, StoreError>;

    /// Records `received` against the invoice, provided it is still in `expected_status`. When `paid` is true the
    /// invoice becomes `Paid` and an `invoice_paid` audit entry is written. Paying an `Overdue` invoice lowers the
    /// tenant's overdue-invoice count.
    async fn record_invoice_payment(
        &self,
        invoice_id: i64,
        expected_status: InvoiceStatus,
        received: Amount,
        paid: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<CommissionInvoice>, StoreError>;

    /// Moves the invoice from `expected_status` to `Waived`, with an `invoice_waived` audit entry.
    async fn waive_invoice(
        &self,
        invoice_id: i64,
        expected_status: InvoiceStatus,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CommissionInvoice>, StoreError>;

    /// Raises the enforcement tier recorded on an `Overdue` invoice to `tier`, deactivates the tenant, and writes the
    /// matching audit entry, in one transaction. Returns `None` (and changes nothing) if the invoice is no longer
    /// overdue, or has already reached `tier`.
    async fn escalate_enforcement(
        &self,
        invoice_id: i64,
        tier: EnforcementTier,
        days_overdue: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<CommissionInvoice>, StoreError>;

    /// `Paid` invoices whose payment time lies in `[start, end)`.
    async fn fetch_invoices_paid_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CommissionInvoice>, StoreError>;
}
