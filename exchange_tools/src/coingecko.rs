use chrono::{DateTime, Utc};
use log::*;
use reqwest::{header::HeaderMap, Method};
use serde_json::Value;
use tsg_common::{Currency, RateTable};

use crate::{helpers::decimal_from_value, ExchangeApiError, RateApiConfig, RestClient};

/// Fetches fiat prices from the CoinGecko `simple/price` endpoint.
#[derive(Clone)]
pub struct CoinGeckoApi {
    client: RestClient,
}

impl CoinGeckoApi {
    pub fn new(config: RateApiConfig) -> Result<Self, ExchangeApiError> {
        let client = RestClient::new(&config.base_url, config.timeout, HeaderMap::new())?;
        Ok(Self { client })
    }

    /// The CoinGecko asset id for a crypto currency.
    pub fn coin_id(currency: Currency) -> Option<&'static str> {
        match currency {
            Currency::Xmr => Some("monero"),
            Currency::Btc => Some("bitcoin"),
            Currency::Eth => Some("ethereum"),
            Currency::Sol => Some("solana"),
            Currency::Ltc => Some("litecoin"),
            Currency::Usdt => Some("tether"),
            Currency::Usdc => Some("usd-coin"),
            Currency::Usd | Currency::Gbp | Currency::Eur => None,
        }
    }

    /// Fetches the price of every crypto in `cryptos` in every fiat in `fiats`. Either every pair is returned, or
    /// the call fails with [`ExchangeApiError::IncompleteRates`].
    pub async fn fetch_rates(&self, cryptos: &[Currency], fiats: &[Currency]) -> Result<RateTable, ExchangeApiError> {
        let ids = cryptos
            .iter()
            .map(|c| Self::coin_id(*c).ok_or_else(|| ExchangeApiError::UnsupportedCurrency(c.to_string())))
            .collect::<Result<Vec<_>, _>>()?
            .join(",");
        let vs = fiats.iter().map(|f| f.ticker()).collect::<Vec<_>>().join(",");
        let params = [("ids", ids), ("vs_currencies", vs)];
        debug!("💱️ Fetching live rates from CoinGecko");
        let json = self.client.rest_query::<Value, ()>(Method::GET, "/simple/price", &params, None).await?;
        let table = Self::parse_prices(&json, cryptos, fiats, Utc::now())?;
        debug!("💱️ Fetched {} rates", table.len());
        Ok(table)
    }

    /// Builds a [`RateTable`] from a `simple/price` response body, e.g. `{"monero": {"usd": 150.2, "eur": 139}}`.
    pub fn parse_prices(
        json: &Value,
        cryptos: &[Currency],
        fiats: &[Currency],
        fetched_at: DateTime<Utc>,
    ) -> Result<RateTable, ExchangeApiError> {
        let mut table = RateTable::new(fetched_at);
        for crypto in cryptos {
            let Some(id) = Self::coin_id(*crypto) else {
                return Err(ExchangeApiError::UnsupportedCurrency(crypto.to_string()));
            };
            for fiat in fiats {
                if let Some(price) = decimal_from_value(&json[id][fiat.ticker()]) {
                    table.set_price(*crypto, *fiat, price);
                }
            }
        }
        let missing = table.missing_pairs(cryptos, fiats);
        if missing.is_empty() {
            Ok(table)
        } else {
            warn!("💱️ Rate response is missing {} pairs: {}", missing.len(), missing.join(", "));
            Err(ExchangeApiError::IncompleteRates(missing))
        }
    }
}
