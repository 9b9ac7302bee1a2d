use std::{
    collections::HashMap,
    fmt::{Debug, Formatter},
};

use cucumber::World;
use log::*;
use settlement_engine::{
    db_types::{CommissionInvoice, Product, Tenant},
    events::EventProducers,
    test_utils::{
        fakes::{FixedRates, ScriptedSwaps},
        prepare_env::{create_database, random_db_path, run_migrations, PLATFORM_WALLET},
    },
    CommissionApi,
    CurrencyConverter,
    OrderFlowApi,
    SqliteDatabase,
};

#[derive(Default, Debug, World)]
pub struct SettlementWorld {
    pub system: Option<SettlementSystem>,
}

pub struct SettlementSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub orders: OrderFlowApi<SqliteDatabase, FixedRates, ScriptedSwaps>,
    pub commission: CommissionApi<SqliteDatabase>,
    pub tenants: HashMap<String, Tenant>,
    pub products: HashMap<String, Product>,
    pub invoices: HashMap<String, CommissionInvoice>,
}

impl SettlementWorld {
    pub fn system(&self) -> &SettlementSystem {
        self.system.as_ref().expect("Settlement system not initialised")
    }

    pub fn system_mut(&mut self) -> &mut SettlementSystem {
        self.system.as_mut().expect("Settlement system not initialised")
    }

    pub fn tenant(&self, name: &str) -> &Tenant {
        self.system().tenants.get(name).unwrap_or_else(|| panic!("No tenant called {name}"))
    }

    pub fn invoice(&self, tenant: &str) -> &CommissionInvoice {
        self.system().invoices.get(tenant).unwrap_or_else(|| panic!("No invoice for {tenant}"))
    }
}

impl Debug for SettlementSystem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementSystem")
            .field("db_path", &self.db_path)
            .field("tenants", &self.tenants.keys().collect::<Vec<_>>())
            .field("invoices", &self.invoices.len())
            .finish()
    }
}

impl SettlementSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let orders = OrderFlowApi::new(
            db.clone(),
            CurrencyConverter::new(FixedRates::standard()),
            ScriptedSwaps::new(),
            EventProducers::default(),
        );
        let commission = CommissionApi::new(db.clone(), PLATFORM_WALLET.to_string(), EventProducers::default());
        Self {
            db_path: url,
            db,
            orders,
            commission,
            tenants: HashMap::new(),
            products: HashMap::new(),
            invoices: HashMap::new(),
        }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
