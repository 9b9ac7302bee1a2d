use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::db_types::{NewProduct, Product};

pub async fn insert_product(
    product: NewProduct,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Product, sqlx::Error> {
    let product: Product = sqlx::query_as(
        r#"
            INSERT INTO products (tenant_id, name, price, inventory, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *;
        "#,
    )
    .bind(product.tenant_id)
    .bind(product.name)
    .bind(product.price)
    .bind(product.inventory)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Product [{}] '{}' created for tenant {}", product.id, product.name, product.tenant_id);
    Ok(product)
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await
}

/// Compare-and-decrement. Takes `quantity` units out of stock if, and only if, the product is active and at least
/// that many units remain. Returns whether the reservation was made.
pub async fn reserve_inventory(
    product_id: i64,
    quantity: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE products SET inventory = inventory - $1, updated_at = $2
            WHERE id = $3 AND active = 1 AND inventory >= $1
        "#,
    )
    .bind(quantity)
    .bind(now)
    .bind(product_id)
    .execute(conn)
    .await?;
    let reserved = result.rows_affected() == 1;
    trace!("🗃️ Reserve {quantity} of product {product_id}: {reserved}");
    Ok(reserved)
}

pub async fn restore_inventory(
    product_id: i64,
    quantity: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET inventory = inventory + $1, updated_at = $2 WHERE id = $3")
        .bind(quantity)
        .bind(now)
        .bind(product_id)
        .execute(conn)
        .await?;
    trace!("🗃️ Restored {quantity} units of product {product_id}");
    Ok(())
}

pub async fn set_active(
    product_id: i64,
    active: bool,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("UPDATE products SET active = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(active)
        .bind(now)
        .bind(product_id)
        .fetch_optional(conn)
        .await
}

pub async fn set_inventory(
    product_id: i64,
    inventory: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("UPDATE products SET inventory = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(inventory)
        .bind(now)
        .bind(product_id)
        .fetch_optional(conn)
        .await
}
