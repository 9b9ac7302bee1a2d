use exchange_tools::{CoinGeckoApi, ExchangeApiError};
use log::*;
use thiserror::Error;
use tsg_common::{Currency, RateTable};

#[derive(Debug, Clone, Error)]
pub enum ExchangeRateError {
    #[error("The rate source is unavailable: {0}")]
    Unavailable(String),
    #[error("The rate source returned an incomplete rate set. Missing: {}", .0.join(", "))]
    Incomplete(Vec<String>),
}

/// A source of live crypto prices in fiat.
///
/// Implementations must return every requested pair, or fail. A partial table is never acceptable.
#[allow(async_fn_in_trait)]
pub trait ExchangeRates {
    async fn fetch_rates(&self, cryptos: &[Currency], fiats: &[Currency]) -> Result<RateTable, ExchangeRateError>;
}

impl ExchangeRates for CoinGeckoApi {
    async fn fetch_rates(&self, cryptos: &[Currency], fiats: &[Currency]) -> Result<RateTable, ExchangeRateError> {
        let table = CoinGeckoApi::fetch_rates(self, cryptos, fiats).await.map_err(|e| {
            warn!("💱️ Could not fetch exchange rates. {e}");
            match e {
                ExchangeApiError::IncompleteRates(missing) => ExchangeRateError::Incomplete(missing),
                e => ExchangeRateError::Unavailable(e.to_string()),
            }
        })?;
        let missing = table.missing_pairs(cryptos, fiats);
        if !missing.is_empty() {
            return Err(ExchangeRateError::Incomplete(missing));
        }
        Ok(table)
    }
}
