//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open a transaction when several writes must be applied
//! together, and call through to the functions without any other changes.
//!
//! Timestamps are stored as RFC3339 text, so every time comparison goes through `julianday()`.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod audit;
pub mod invoices;
pub mod orders;
pub mod products;
pub mod tenants;

const SQLITE_DB_URL: &str = "sqlite://data/settlement.db";

pub fn db_url() -> String {
    let result = env::var("TSG_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ TSG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
