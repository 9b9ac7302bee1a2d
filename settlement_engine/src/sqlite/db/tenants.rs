use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{CommissionRate, NewTenant, Tenant};

pub async fn insert_tenant(
    tenant: NewTenant,
    encryption_key: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Tenant, sqlx::Error> {
    let tenant: Tenant = sqlx::query_as(
        r#"
            INSERT INTO tenants (name, wallet_address, commission_rate, encryption_key, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *;
        "#,
    )
    .bind(tenant.name)
    .bind(tenant.wallet_address)
    .bind(tenant.commission_rate)
    .bind(encryption_key)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Tenant [{}] '{}' created", tenant.id, tenant.name);
    Ok(tenant)
}

pub async fn fetch_tenant(tenant_id: i64, conn: &mut SqliteConnection) -> Result<Option<Tenant>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM tenants WHERE id = $1").bind(tenant_id).fetch_optional(conn).await
}

pub async fn fetch_active_tenants(conn: &mut SqliteConnection) -> Result<Vec<Tenant>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM tenants WHERE active = 1 ORDER BY id ASC").fetch_all(conn).await
}

pub async fn set_commission_rate(
    tenant_id: i64,
    rate: CommissionRate,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Tenant>, sqlx::Error> {
    sqlx::query_as("UPDATE tenants SET commission_rate = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(rate)
        .bind(now)
        .bind(tenant_id)
        .fetch_optional(conn)
        .await
}

pub async fn set_wallet_address(
    tenant_id: i64,
    wallet: Option<String>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Tenant>, sqlx::Error> {
    sqlx::query_as("UPDATE tenants SET wallet_address = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(wallet)
        .bind(now)
        .bind(tenant_id)
        .fetch_optional(conn)
        .await
}

pub async fn set_active(
    tenant_id: i64,
    active: bool,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Tenant>, sqlx::Error> {
    sqlx::query_as("UPDATE tenants SET active = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(active)
        .bind(now)
        .bind(tenant_id)
        .fetch_optional(conn)
        .await
}

/// Adds `delta` to the tenant's overdue-invoice count, never letting it drop below zero.
pub async fn adjust_overdue_count(
    tenant_id: i64,
    delta: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tenants SET overdue_invoices = MAX(overdue_invoices + $1, 0), updated_at = $2 WHERE id = $3")
        .bind(delta)
        .bind(now)
        .bind(tenant_id)
        .execute(conn)
        .await?;
    Ok(())
}
