//! `SqliteDatabase` is a concrete implementation of a settlement engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the storage traits defined in the [`traits`]
//! module.
//!
//! [`traits`]: crate::traits
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use serde_json::json;
use sqlx::SqlitePool;

use super::db::{audit, db_url, invoices, new_pool, orders, products, tenants};
use crate::{
    db_types::{
        Amount,
        AuditAction,
        AuditLogEntry,
        CommissionInvoice,
        CommissionRate,
        EnforcementTier,
        InvoiceStatus,
        NewAuditEntry,
        NewInvoice,
        NewOrder,
        NewProduct,
        NewTenant,
        Order,
        OrderStatusType,
        Product,
        SwapStatus,
        Tenant,
    },
    helpers::generate_tenant_key,
    traits::{CommissionManagement, SettlementDatabase, StoreError, TenantManagement},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `TSG_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        trace!("🗃️ Created new DB pool for {url}");
        Ok(Self { url: url.to_string(), pool })
    }

    /// Runs the embedded schema migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl TenantManagement for SqliteDatabase {
    async fn create_tenant(&self, tenant: NewTenant) -> Result<Tenant, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let key = generate_tenant_key();
        let tenant = tenants::insert_tenant(tenant, &key, Utc::now(), &mut conn).await?;
        Ok(tenant)
    }

    async fn fetch_tenant(&self, tenant_id: i64) -> Result<Option<Tenant>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let tenant = tenants::fetch_tenant(tenant_id, &mut conn).await?;
        Ok(tenant)
    }

    async fn fetch_active_tenants(&self) -> Result<Vec<Tenant>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let tenants = tenants::fetch_active_tenants(&mut conn).await?;
        Ok(tenants)
    }

    async fn set_commission_rate(&self, tenant_id: i64, rate: CommissionRate) -> Result<Tenant, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let tenant = tenants::set_commission_rate(tenant_id, rate, Utc::now(), &mut conn)
            .await?
            .ok_or(StoreError::TenantNotFound(tenant_id))?;
        info!("🗃️ Commission rate for tenant {tenant_id} is now {rate}");
        Ok(tenant)
    }

    async fn set_wallet_address(&self, tenant_id: i64, wallet: Option<String>) -> Result<Tenant, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let tenant = tenants::set_wallet_address(tenant_id, wallet, Utc::now(), &mut conn)
            .await?
            .ok_or(StoreError::TenantNotFound(tenant_id))?;
        Ok(tenant)
    }

    async fn set_tenant_active(&self, tenant_id: i64, active: bool) -> Result<Tenant, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let tenant = tenants::set_active(tenant_id, active, Utc::now(), &mut conn)
            .await?
            .ok_or(StoreError::TenantNotFound(tenant_id))?;
        info!("🗃️ Tenant {tenant_id} active: {active}");
        Ok(tenant)
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let tenant_id = product.tenant_id;
        if tenants::fetch_tenant(tenant_id, &mut conn).await?.is_none() {
            return Err(StoreError::TenantNotFound(tenant_id));
        }
        let product = products::insert_product(product, Utc::now(), &mut conn).await?;
        Ok(product)
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn set_product_active(&self, product_id: i64, active: bool) -> Result<Product, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::set_active(product_id, active, Utc::now(), &mut conn)
            .await?
            .ok_or(StoreError::ProductNotFound(product_id))?;
        Ok(product)
    }

    async fn set_inventory(&self, product_id: i64, inventory: i64) -> Result<Product, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::set_inventory(product_id, inventory, Utc::now(), &mut conn)
            .await?
            .ok_or(StoreError::ProductNotFound(product_id))?;
        Ok(product)
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order_with_reservation(&self, order: NewOrder) -> Result<Order, StoreError> {
        let (tenant_id, product_id, quantity, now) = (order.tenant_id, order.product_id, order.quantity, order.created_at);
        // The inventory update is the first statement, so the write lock is taken before anything is read
        let mut tx = self.pool.begin().await?;
        if !products::reserve_inventory(product_id, quantity, now, &mut tx).await? {
            debug!("🗃️ Could not reserve {quantity} of product {product_id}. Rolling back");
            return Err(StoreError::InventoryConflict { product_id, requested: quantity });
        }
        let order = orders::insert_order(order, &mut tx).await?;
        let details = json!({
            "order_id": order.id,
            "product_id": product_id,
            "quantity": quantity,
            "total_price": order.total_price,
            "commission": order.commission,
            "payment_currency": order.payment_currency,
        });
        audit::insert_entry(NewAuditEntry::new(tenant_id, AuditAction::OrderCreated, details, now), &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_by_status(&self, statuses: &[OrderStatusType]) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_by_status(statuses, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_orders_for_tenant(&self, tenant_id: i64) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_tenant(tenant_id, &mut conn).await?;
        Ok(orders)
    }

    async fn mark_order_paid(
        &self,
        order_id: i64,
        swap_status: Option<SwapStatus>,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::mark_paid(order_id, swap_status, now, &mut tx).await?;
        if let Some(order) = &order {
            let details = json!({ "order_id": order.id, "total_price": order.total_price });
            let entry = NewAuditEntry::new(order.tenant_id, AuditAction::OrderPaid, details, now);
            audit::insert_entry(entry, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(order)
    }

    async fn annul_order(
        &self,
        order_id: i64,
        status: OrderStatusType,
        swap_status: Option<SwapStatus>,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, StoreError> {
        let action = match status {
            OrderStatusType::Cancelled => AuditAction::OrderCancelled,
            OrderStatusType::Expired => AuditAction::OrderExpired,
            s => return Err(StoreError::IllegalTransition(format!("An order cannot be annulled to {s}"))),
        };
        let mut tx = self.pool.begin().await?;
        let order = orders::annul(order_id, status, swap_status, now, &mut tx).await?;
        if let Some(order) = &order {
            products::restore_inventory(order.product_id, order.quantity, now, &mut tx).await?;
            let details = json!({ "order_id": order.id, "product_id": order.product_id, "quantity": order.quantity });
            audit::insert_entry(NewAuditEntry::new(order.tenant_id, action, details, now), &mut tx).await?;
            debug!("🗃️ Order [{order_id}] is now {status}. {} units returned to stock", order.quantity);
        }
        tx.commit().await?;
        Ok(order)
    }

    async fn mark_order_fulfilled(&self, order_id: i64, now: DateTime<Utc>) -> Result<Option<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::mark_fulfilled(order_id, now, &mut tx).await?;
        if let Some(order) = &order {
            let details = json!({ "order_id": order.id });
            let entry = NewAuditEntry::new(order.tenant_id, AuditAction::OrderFulfilled, details, now);
            audit::insert_entry(entry, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(order)
    }

    async fn update_swap_status(
        &self,
        order_id: i64,
        swap_status: SwapStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::update_swap_status(order_id, swap_status, now, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_unpaid_orders_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_unpaid_created_before(cutoff, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_audit_log_for_tenant(&self, tenant_id: i64) -> Result<Vec<AuditLogEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let entries = audit::fetch_for_tenant(tenant_id, &mut conn).await?;
        Ok(entries)
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl CommissionManagement for SqliteDatabase {
    async fn fetch_completed_orders(
        &self,
        tenant_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_completed_in_period(tenant_id, start, end, &mut conn).await?;
        Ok(orders)
    }

    async fn insert_invoice(&self, invoice: NewInvoice) -> Result<CommissionInvoice, StoreError> {
        let tenant_id = invoice.tenant_id;
        let now = invoice.created_at;
        let mut tx = self.pool.begin().await?;
        let invoice = invoices::insert_invoice(invoice, &mut tx)
            .await?
            .ok_or(StoreError::OverlappingInvoicePeriod { tenant_id })?;
        let details = json!({
            "invoice_id": invoice.id,
            "period_start": invoice.period_start,
            "period_end": invoice.period_end,
            "order_count": invoice.order_count,
            "total_sales": invoice.total_sales,
            "commission_due": invoice.commission_due,
        });
        audit::insert_entry(NewAuditEntry::new(tenant_id, AuditAction::InvoiceGenerated, details, now), &mut tx).await?;
        tx.commit().await?;
        Ok(invoice)
    }

    async fn fetch_invoice(&self, invoice_id: i64) -> Result<Option<CommissionInvoice>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let invoice = invoices::fetch_invoice(invoice_id, &mut conn).await?;
        Ok(invoice)
    }

    async fn fetch_invoices_by_status(&self, statuses: &[InvoiceStatus]) -> Result<Vec<CommissionInvoice>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let invoices = invoices::fetch_by_status(statuses, &mut conn).await?;
        Ok(invoices)
    }

    async fn fetch_invoices_for_tenant(&self, tenant_id: i64) -> Result<Vec<CommissionInvoice>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let invoices = invoices::fetch_for_tenant(tenant_id, &mut conn).await?;
        Ok(invoices)
    }

    async fn mark_overdue_invoices(&self, now: DateTime<Utc>) -> Result<Vec<CommissionInvoice>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let overdue = invoices::mark_overdue(now, &mut tx).await?;
        for invoice in &overdue {
            tenants::adjust_overdue_count(invoice.tenant_id, 1, now, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(overdue)
    }

    async fn record_invoice_payment(
        &self,
        invoice_id: i64,
        expected_status: InvoiceStatus,
        received: Amount,
        paid: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<CommissionInvoice>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let invoice = invoices::record_payment(invoice_id, expected_status, received, paid, now, &mut tx).await?;
        if let (Some(invoice), true) = (&invoice, paid) {
            if expected_status == InvoiceStatus::Overdue {
                tenants::adjust_overdue_count(invoice.tenant_id, -1, now, &mut tx).await?;
            }
            let details = json!({
                "invoice_id": invoice.id,
                "amount_received": invoice.amount_received,
                "commission_due": invoice.commission_due,
            });
            let entry = NewAuditEntry::new(invoice.tenant_id, AuditAction::InvoicePaid, details, now);
            audit::insert_entry(entry, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(invoice)
    }

    async fn waive_invoice(
        &self,
        invoice_id: i64,
        expected_status: InvoiceStatus,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CommissionInvoice>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let invoice = invoices::waive(invoice_id, expected_status, reason, now, &mut tx).await?;
        if let Some(invoice) = &invoice {
            if expected_status == InvoiceStatus::Overdue {
                tenants::adjust_overdue_count(invoice.tenant_id, -1, now, &mut tx).await?;
            }
            let details = json!({ "invoice_id": invoice.id, "reason": reason });
            let entry = NewAuditEntry::new(invoice.tenant_id, AuditAction::InvoiceWaived, details, now);
            audit::insert_entry(entry, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(invoice)
    }

    async fn escalate_enforcement(
        &self,
        invoice_id: i64,
        tier: EnforcementTier,
        days_overdue: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<CommissionInvoice>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let invoice = invoices::escalate(invoice_id, tier, now, &mut tx).await?;
        if let Some(invoice) = &invoice {
            tenants::set_active(invoice.tenant_id, false, now, &mut tx).await?;
            let details = json!({
                "invoice_id": invoice.id,
                "days_overdue": days_overdue,
                "commission_due": invoice.commission_due,
            });
            audit::insert_entry(NewAuditEntry::new(invoice.tenant_id, tier.audit_action(), details, now), &mut tx)
                .await?;
            warn!("🗃️ Tenant {} deactivated ({tier}) for invoice {invoice_id}", invoice.tenant_id);
        }
        tx.commit().await?;
        Ok(invoice)
    }

    async fn fetch_invoices_paid_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CommissionInvoice>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let invoices = invoices::fetch_paid_between(start, end, &mut conn).await?;
        Ok(invoices)
    }
}
