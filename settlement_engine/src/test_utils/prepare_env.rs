use std::path::Path;

use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tsg_common::Amount;

use crate::{
    db_types::{NewProduct, NewTenant, Product, Tenant},
    traits::TenantManagement,
    SqliteDatabase,
};

/// A wallet address with the shape of a Monero primary address.
pub const TEST_WALLET: &str =
    "44AFFq5kSiGBoZ4NMDwYtN18obc8AemS33DBLWs3H7otXft3XjrpDtQGv7SqSsaBYBb98uNbr2VBBEt7f2wfn3RVGQBEP3A";
pub const PLATFORM_WALLET: &str =
    "48edfHu7V9Z84YzzMa6fUueoELZ9ZRXq9VetWzYGzKt52XU5xvqgzYnDK9URnRoJMk1j8nLwEVsaSWJ4fhdUyZijBGUicoD";

pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await;
}

/// Creates a fresh, migrated database in the system temp directory.
pub async fn prepare_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 25).await.expect("Error creating connection to database")
}

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/settlement_test_{}.db", dir.display(), rand::random::<u64>())
}

pub async fn run_migrations(url: &str) {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().unwrap();
    if let Err(e) = Sqlite::drop_database(p).await {
        warn!("Error dropping database {p}: {e:?}");
    }
    Sqlite::create_database(p).await.expect("Error creating database");
    info!("Created Sqlite database {p}");
}

/// An active tenant with the default commission rate and [`TEST_WALLET`] as its settlement wallet.
pub async fn seed_tenant<B: TenantManagement>(db: &B, name: &str) -> Tenant {
    db.create_tenant(NewTenant::new(name).with_wallet(TEST_WALLET)).await.expect("Error creating tenant")
}

pub async fn seed_product<B: TenantManagement>(db: &B, tenant_id: i64, price: Amount, inventory: i64) -> Product {
    let product = NewProduct::new(tenant_id, format!("Product for tenant {tenant_id}"), price, inventory);
    db.create_product(product).await.expect("Error creating product")
}
