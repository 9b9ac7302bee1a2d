use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::db_types::{Amount, CommissionInvoice, EnforcementTier, InvoiceStatus, NewInvoice};

fn invoice_status_list(statuses: &[InvoiceStatus]) -> String {
    statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",")
}

/// Inserts the invoice, unless the tenant already has an invoice whose half-open period intersects the new one. The
/// overlap check and the insert are a single statement, so two racing inserts cannot both succeed. Returns `None` on
/// overlap.
pub async fn insert_invoice(
    invoice: NewInvoice,
    conn: &mut SqliteConnection,
) -> Result<Option<CommissionInvoice>, sqlx::Error> {
    let inserted: Option<CommissionInvoice> = sqlx::query_as(
        r#"
            INSERT INTO commission_invoices (
                tenant_id,
                period_start,
                period_end,
                order_count,
                total_sales,
                commission_rate,
                commission_due,
                order_commission,
                payment_address,
                payment_id,
                amount_received,
                status,
                due_date,
                created_at,
                updated_at
            )
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'Pending', $12, $13, $13
            WHERE NOT EXISTS (
                SELECT 1 FROM commission_invoices
                WHERE tenant_id = $1 AND julianday(period_end) > julianday($2) AND julianday(period_start) < julianday($3)
            )
            RETURNING *;
        "#,
    )
    .bind(invoice.tenant_id)
    .bind(invoice.period_start)
    .bind(invoice.period_end)
    .bind(invoice.order_count)
    .bind(invoice.total_sales)
    .bind(invoice.commission_rate)
    .bind(invoice.commission_due)
    .bind(invoice.order_commission)
    .bind(invoice.payment_address)
    .bind(invoice.payment_id)
    .bind(Amount::ZERO)
    .bind(invoice.due_date)
    .bind(invoice.created_at)
    .fetch_optional(conn)
    .await?;
    match &inserted {
        Some(invoice) => debug!("🗃️ Invoice [{}] inserted for tenant {}", invoice.id, invoice.tenant_id),
        None => debug!("🗃️ Invoice period overlaps an existing invoice. Nothing inserted"),
    }
    Ok(inserted)
}

pub async fn fetch_invoice(
    invoice_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<CommissionInvoice>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM commission_invoices WHERE id = $1").bind(invoice_id).fetch_optional(conn).await
}

pub async fn fetch_by_status(
    statuses: &[InvoiceStatus],
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionInvoice>, sqlx::Error> {
    if statuses.is_empty() {
        return Ok(vec![]);
    }
    let q = format!(
        "SELECT * FROM commission_invoices WHERE status IN ({}) ORDER BY id ASC",
        invoice_status_list(statuses)
    );
    let invoices = sqlx::query_as(&q).fetch_all(conn).await?;
    Ok(invoices)
}

pub async fn fetch_for_tenant(
    tenant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionInvoice>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM commission_invoices WHERE tenant_id = $1 ORDER BY period_start ASC")
        .bind(tenant_id)
        .fetch_all(conn)
        .await
}

/// `Pending` invoices due before `now` become `Overdue`. Returns the invoices that changed.
pub async fn mark_overdue(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionInvoice>, sqlx::Error> {
    let invoices: Vec<CommissionInvoice> = sqlx::query_as(
        r#"
            UPDATE commission_invoices SET status = 'Overdue', updated_at = $1
            WHERE status = 'Pending' AND julianday(due_date) < julianday($1)
            RETURNING *;
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    trace!("🗃️ {} invoices marked overdue", invoices.len());
    Ok(invoices)
}

/// Records the amount received. If `paid` is set, the invoice moves to `Paid` as well. Either way, the update only
/// applies while the invoice is still in `expected`.
pub async fn record_payment(
    invoice_id: i64,
    expected: InvoiceStatus,
    received: Amount,
    paid: bool,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<CommissionInvoice>, sqlx::Error> {
    let new_status = if paid { InvoiceStatus::Paid } else { expected };
    let paid_at = if paid { Some(now) } else { None };
    sqlx::query_as(
        r#"
            UPDATE commission_invoices
            SET amount_received = $1, status = $2, paid_at = COALESCE($3, paid_at), updated_at = $4
            WHERE id = $5 AND status = $6
            RETURNING *;
        "#,
    )
    .bind(received)
    .bind(new_status)
    .bind(paid_at)
    .bind(now)
    .bind(invoice_id)
    .bind(expected)
    .fetch_optional(conn)
    .await
}

pub async fn waive(
    invoice_id: i64,
    expected: InvoiceStatus,
    reason: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<CommissionInvoice>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE commission_invoices SET status = 'Waived', waiver_reason = $1, updated_at = $2
            WHERE id = $3 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(reason)
    .bind(now)
    .bind(invoice_id)
    .bind(expected)
    .fetch_optional(conn)
    .await
}

/// Records `tier` on an overdue invoice, if it has not reached that tier already.
pub async fn escalate(
    invoice_id: i64,
    tier: EnforcementTier,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<CommissionInvoice>, sqlx::Error> {
    let lower_tiers = match tier {
        EnforcementTier::Suspended => "enforcement IS NULL",
        EnforcementTier::Terminated => "(enforcement IS NULL OR enforcement = 'Suspended')",
    };
    let q = format!(
        "UPDATE commission_invoices SET enforcement = $1, updated_at = $2 WHERE id = $3 AND status = 'Overdue' AND \
         {lower_tiers} RETURNING *"
    );
    let invoice = sqlx::query_as(&q).bind(tier).bind(now).bind(invoice_id).fetch_optional(conn).await?;
    Ok(invoice)
}

pub async fn fetch_paid_between(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionInvoice>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM commission_invoices
            WHERE status = 'Paid' AND paid_at IS NOT NULL
              AND julianday(paid_at) >= julianday($1) AND julianday(paid_at) < julianday($2)
            ORDER BY id ASC
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(conn)
    .await
}
