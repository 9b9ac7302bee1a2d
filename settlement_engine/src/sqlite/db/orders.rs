use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::db_types::{NewOrder, Order, OrderStatusType, SwapStatus};

/// Renders a list of statuses for use in an `IN (...)` clause. The values come from the enum, never from user input.
pub(crate) fn status_list(statuses: &[OrderStatusType]) -> String {
    statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",")
}

/// Inserts a new order using the given connection. This is not atomic, and does not touch inventory. To reserve
/// stock and create the order together, call this inside a transaction after
/// [`super::products::reserve_inventory`] has succeeded.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                tenant_id,
                product_id,
                quantity,
                total_price,
                commission,
                commission_rate,
                payment_currency,
                payment_amount,
                payment_address,
                swap_id,
                swap_provider,
                swap_status,
                swap_expires_at,
                delivery_address,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
            RETURNING *;
        "#,
    )
    .bind(order.tenant_id)
    .bind(order.product_id)
    .bind(order.quantity)
    .bind(order.total_price)
    .bind(order.commission)
    .bind(order.commission_rate)
    .bind(order.payment_currency)
    .bind(order.payment_amount)
    .bind(order.payment_address)
    .bind(order.swap_id)
    .bind(order.swap_provider)
    .bind(order.swap_status)
    .bind(order.swap_expires_at)
    .bind(order.delivery_address)
    .bind(order.status)
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order [{}] inserted for tenant {} ({})", order.id, order.tenant_id, order.status);
    Ok(order)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await
}

pub async fn fetch_orders_by_status(
    statuses: &[OrderStatusType],
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    if statuses.is_empty() {
        return Ok(vec![]);
    }
    let q = format!("SELECT * FROM orders WHERE status IN ({}) ORDER BY id ASC", status_list(statuses));
    let orders = sqlx::query_as(&q).fetch_all(conn).await?;
    Ok(orders)
}

pub async fn fetch_orders_for_tenant(tenant_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE tenant_id = $1 ORDER BY id ASC").bind(tenant_id).fetch_all(conn).await
}

/// `Pending`/`SwapPending` → `Paid`, stamping `paid_at`. A `None` swap status leaves the stored one alone.
pub async fn mark_paid(
    order_id: i64,
    swap_status: Option<SwapStatus>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let q = format!(
        "UPDATE orders SET status = 'Paid', swap_status = COALESCE($1, swap_status), paid_at = $2, updated_at = $2 \
         WHERE id = $3 AND status IN ({}) RETURNING *",
        status_list(&OrderStatusType::AWAITING_PAYMENT)
    );
    let order: Option<Order> = sqlx::query_as(&q).bind(swap_status).bind(now).bind(order_id).fetch_optional(conn).await?;
    trace!("🗃️ mark_paid({order_id}) applied: {}", order.is_some());
    Ok(order)
}

/// Moves the order to `Cancelled` or `Expired`. The source states depend on the target: any non-terminal order can
/// be cancelled, but only unpaid orders can expire. Inventory is *not* restored here.
pub async fn annul(
    order_id: i64,
    status: OrderStatusType,
    swap_status: Option<SwapStatus>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let from = match status {
        OrderStatusType::Cancelled => status_list(&OrderStatusType::NON_TERMINAL),
        OrderStatusType::Expired => status_list(&OrderStatusType::AWAITING_PAYMENT),
        _ => return Ok(None),
    };
    let q = format!(
        "UPDATE orders SET status = $1, swap_status = COALESCE($2, swap_status), updated_at = $3 WHERE id = $4 AND \
         status IN ({from}) RETURNING *"
    );
    let order = sqlx::query_as(&q).bind(status).bind(swap_status).bind(now).bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn mark_fulfilled(
    order_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE orders SET status = 'Fulfilled', shipped_at = $1, updated_at = $1 WHERE id = $2 AND status = 'Paid' \
         RETURNING *",
    )
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await
}

pub async fn update_swap_status(
    order_id: i64,
    swap_status: SwapStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE orders SET swap_status = $1, updated_at = $2 WHERE id = $3 AND status = 'SwapPending' RETURNING *",
    )
    .bind(swap_status)
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_unpaid_created_before(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let q = format!(
        "SELECT * FROM orders WHERE status IN ({}) AND julianday(created_at) < julianday($1) ORDER BY id ASC",
        status_list(&OrderStatusType::AWAITING_PAYMENT)
    );
    let orders = sqlx::query_as(&q).bind(cutoff).fetch_all(conn).await?;
    Ok(orders)
}

/// `Paid` and `Fulfilled` orders for the tenant with `paid_at` in `[start, end)`.
pub async fn fetch_completed_in_period(
    tenant_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let q = format!(
        "SELECT * FROM orders WHERE tenant_id = $1 AND status IN ({}) AND paid_at IS NOT NULL AND julianday(paid_at) \
         >= julianday($2) AND julianday(paid_at) < julianday($3) ORDER BY id ASC",
        status_list(&OrderStatusType::COMPLETED)
    );
    let orders = sqlx::query_as(&q).bind(tenant_id).bind(start).bind(end).fetch_all(conn).await?;
    Ok(orders)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_lists() {
        assert_eq!(status_list(&OrderStatusType::AWAITING_PAYMENT), "'Pending','SwapPending'");
        assert_eq!(status_list(&[]), "");
    }
}
