use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{AuditLogEntry, NewOrder, Order, OrderStatusType, SwapStatus},
    traits::TenantManagement,
};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Tenant {0} does not exist")]
    TenantNotFound(i64),
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
    #[error("Commission invoice {0} does not exist")]
    InvoiceNotFound(i64),
    #[error("Could not reserve {requested} units of product {product_id}. Stock ran out, or the product was deactivated")]
    InventoryConflict { product_id: i64, requested: i64 },
    #[error("Tenant {tenant_id} already has an invoice covering part of this period")]
    OverlappingInvoicePeriod { tenant_id: i64 },
    #[error("Illegal state transition. {0}")]
    IllegalTransition(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

/// The order store.
///
/// Order state transitions are all conditional updates. Each transition method returns `None` when the order was not
/// in a state from which the transition is allowed, which includes the case where a concurrent caller got there
/// first. Callers decide whether that is an error.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone + TenantManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Reserves `order.quantity` units of the product and inserts the order, atomically.
    ///
    /// The reservation only succeeds if the product is active and has at least `quantity` units in stock. Otherwise
    /// [`StoreError::InventoryConflict`] is returned, and nothing is written. An `order_created` audit entry is written
    /// in the same transaction.
    async fn insert_order_with_reservation(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, StoreError>;

    /// Fetches every order currently in one of the given states, oldest first.
    async fn fetch_orders_by_status(&self, statuses: &[OrderStatusType]) -> Result<Vec<Order>, StoreError>;

    async fn fetch_orders_for_tenant(&self, tenant_id: i64) -> Result<Vec<Order>, StoreError>;

    /// `Pending` or `SwapPending` → `Paid`. The swap status, if given, is written in the same update.
    async fn mark_order_paid(
        &self,
        order_id: i64,
        swap_status: Option<SwapStatus>,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, StoreError>;

    /// Moves an order to `Cancelled` (from any non-terminal state) or `Expired` (from `Pending` or `SwapPending`
    /// only) and returns its reserved quantity to stock, in one transaction.
    async fn annul_order(
        &self,
        order_id: i64,
        status: OrderStatusType,
        swap_status: Option<SwapStatus>,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, StoreError>;

    /// `Paid` → `Fulfilled`.
    async fn mark_order_fulfilled(&self, order_id: i64, now: DateTime<Utc>) -> Result<Option<Order>, StoreError>;

    /// Records a new, non-terminal swap status on a `SwapPending` order.
    async fn update_swap_status(
        &self,
        order_id: i64,
        swap_status: SwapStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, StoreError>;

    /// `Pending` and `SwapPending` orders created before `cutoff`.
    async fn fetch_unpaid_orders_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StoreError>;

    async fn fetch_audit_log_for_tenant(&self, tenant_id: i64) -> Result<Vec<AuditLogEntry>, StoreError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), StoreError>;
}
