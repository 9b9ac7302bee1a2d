use std::sync::Arc;

use exchange_tools::{CoinGeckoApi, MoneroWalletRpc};
use log::*;
use settlement_engine::{
    events::EventProducers,
    CommissionApi,
    CurrencyConverter,
    OrderFlowApi,
    SqliteDatabase,
    SwapOrchestrator,
};

use crate::{config::ServerConfig, errors::ServerError};

pub type LiveOrderFlow = OrderFlowApi<SqliteDatabase, CoinGeckoApi, SwapOrchestrator>;
pub type LiveCommission = CommissionApi<SqliteDatabase>;

/// The engine APIs, wired to the live database and external services.
#[derive(Clone)]
pub struct Services {
    pub db: SqliteDatabase,
    pub orders: Arc<LiveOrderFlow>,
    pub commission: Arc<LiveCommission>,
    /// Only present when a wallet RPC endpoint is configured.
    pub wallet: Option<Arc<MoneroWalletRpc>>,
}

impl Services {
    pub async fn connect(config: &ServerConfig, producers: EventProducers) -> Result<Self, ServerError> {
        let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
            .await
            .map_err(|e| ServerError::InitializeError(format!("Could not connect to the database. {e}")))?;
        if config.run_migrations {
            db.run_migrations()
                .await
                .map_err(|e| ServerError::InitializeError(format!("Could not run database migrations. {e}")))?;
        }
        let rates = CoinGeckoApi::new(config.exchange.rates.clone())?;
        let swaps = SwapOrchestrator::from_config(&config.exchange, &config.swap_providers, config.testnet)?;
        let providers = swaps.provider_names();
        if providers.is_empty() {
            warn!("🪛️ No swap providers are configured. Only XMR payments will be possible on mainnet.");
        } else {
            info!("🪛️ Swap providers, in order of preference: {}", providers.join(", "));
        }
        let orders = OrderFlowApi::new(db.clone(), CurrencyConverter::new(rates), swaps, producers.clone());
        let commission = CommissionApi::new(db.clone(), config.platform_wallet_address.clone(), producers);
        let wallet = match &config.exchange.wallet_rpc {
            Some(rpc) => Some(Arc::new(MoneroWalletRpc::new(rpc.clone())?)),
            None => None,
        };
        Ok(Self { db, orders: Arc::new(orders), commission: Arc::new(commission), wallet })
    }
}
