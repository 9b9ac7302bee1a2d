use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{AuditLogEntry, NewAuditEntry};

pub async fn insert_entry(entry: NewAuditEntry, conn: &mut SqliteConnection) -> Result<AuditLogEntry, sqlx::Error> {
    let row: AuditLogEntry = sqlx::query_as(
        r#"
            INSERT INTO audit_log (tenant_id, action, details, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(entry.tenant_id)
    .bind(entry.action.as_str())
    .bind(entry.details.to_string())
    .bind(entry.created_at)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Audit [{}] {}: {}", row.id, row.action, row.details);
    Ok(row)
}

pub async fn fetch_for_tenant(tenant_id: i64, conn: &mut SqliteConnection) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM audit_log WHERE tenant_id = $1 ORDER BY id ASC").bind(tenant_id).fetch_all(conn).await
}
