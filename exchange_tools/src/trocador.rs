use chrono::{Duration, Utc};
use log::*;
use reqwest::{header::HeaderMap, Method};
use tsg_common::{Amount, Currency, SwapOrder, SwapQuote, SwapStatus};

use crate::{
    data_objects::{StatusResponse, TrocadorNewTrade, TrocadorRate, TrocadorTrade},
    ExchangeApiError,
    ProviderConfig,
    RestClient,
};

const QUOTE_LIFETIME_MINUTES: i64 = 10;
const SWAP_LIFETIME_HOURS: i64 = 24;

/// Adapter for the Trocador swap aggregator.
#[derive(Clone)]
pub struct TrocadorApi {
    config: ProviderConfig,
    client: RestClient,
}

impl TrocadorApi {
    pub const NAME: &'static str = "trocador";

    pub fn new(config: ProviderConfig) -> Result<Self, ExchangeApiError> {
        let client = RestClient::new(&config.base_url, config.timeout, HeaderMap::new())?;
        Ok(Self { config, client })
    }

    pub async fn quote(&self, from: Currency, amount: Amount) -> Result<SwapQuote, ExchangeApiError> {
        let to = Currency::REFERENCE;
        let params = [
            ("api_key", self.config.api_key.reveal().clone()),
            ("ticker_from", from.ticker()),
            ("ticker_to", to.ticker()),
            ("amount_from", amount.to_string()),
        ];
        debug!("🔀️ Requesting Trocador rate for {amount} {from}");
        let rate = self.client.rest_query::<TrocadorRate, ()>(Method::GET, "/new_rate", &params, None).await?;
        if !rate.success {
            return Err(ExchangeApiError::Rejected(format!("Trocador declined to quote {amount} {from}")));
        }
        let to_amount = Amount::from(rate.amount_to);
        let implied = to_amount
            .checked_div(amount.value())
            .ok_or_else(|| ExchangeApiError::MalformedResponse("cannot derive rate from zero amount".into()))?;
        Ok(SwapQuote {
            from_currency: from,
            to_currency: to,
            from_amount: amount,
            to_amount,
            rate: implied.value(),
            provider: Self::NAME.to_string(),
            quote_id: rate.id,
            expires_at: Utc::now() + Duration::minutes(QUOTE_LIFETIME_MINUTES),
        })
    }

    pub async fn create_swap(
        &self,
        from: Currency,
        amount: Amount,
        destination: &str,
        refund: Option<&str>,
    ) -> Result<SwapOrder, ExchangeApiError> {
        let to = Currency::REFERENCE;
        let body = TrocadorNewTrade {
            api_key: self.config.api_key.reveal(),
            ticker_from: from.ticker(),
            ticker_to: to.ticker(),
            amount_from: amount.to_string(),
            address: destination,
            refund: refund.unwrap_or_default(),
        };
        debug!("🔀️ Creating Trocador trade for {amount} {from}");
        let trade = self.client.rest_query::<TrocadorTrade, _>(Method::POST, "/new_trade", &[], Some(body)).await?;
        if !trade.success {
            return Err(ExchangeApiError::Rejected(format!("Trocador declined to create a trade for {amount} {from}")));
        }
        let now = Utc::now();
        info!("🔀️ Trocador trade {} created", trade.trade_id);
        Ok(SwapOrder {
            swap_id: trade.trade_id,
            from_currency: from,
            to_currency: to,
            from_amount: amount,
            deposit_address: trade.address_provider,
            expected_amount: Amount::from(trade.amount_to),
            destination_address: destination.to_string(),
            refund_address: refund.map(String::from),
            provider: Self::NAME.to_string(),
            status: SwapStatus::Waiting,
            expires_at: now + Duration::hours(SWAP_LIFETIME_HOURS),
            created_at: now,
        })
    }

    pub async fn check_status(&self, swap_id: &str) -> Result<SwapStatus, ExchangeApiError> {
        let params = [("api_key", self.config.api_key.reveal().clone()), ("id", swap_id.to_string())];
        let response = self.client.rest_query::<StatusResponse, ()>(Method::GET, "/trade", &params, None).await?;
        let status = Self::map_status(&response.status);
        trace!("🔀️ Trocador trade {swap_id} reports '{}' ({status})", response.status);
        Ok(status)
    }

    /// Maps Trocador's status vocabulary onto [`SwapStatus`]. Anything unrecognised is `Waiting`.
    pub fn map_status(status: &str) -> SwapStatus {
        match status.trim().to_ascii_lowercase().as_str() {
            "waiting" => SwapStatus::Waiting,
            "confirming" => SwapStatus::Confirming,
            "exchanging" => SwapStatus::Exchanging,
            "complete" | "finished" => SwapStatus::Complete,
            "failed" => SwapStatus::Failed,
            "expired" => SwapStatus::Expired,
            other => {
                debug!("🔀️ Unknown Trocador status '{other}'. Treating it as waiting");
                SwapStatus::Waiting
            },
        }
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    #[test]
    fn status_vocabulary() {
        assert_eq!(TrocadorApi::map_status("waiting"), SwapStatus::Waiting);
        assert_eq!(TrocadorApi::map_status("Confirming"), SwapStatus::Confirming);
        assert_eq!(TrocadorApi::map_status("exchanging"), SwapStatus::Exchanging);
        assert_eq!(TrocadorApi::map_status("finished"), SwapStatus::Complete);
        assert_eq!(TrocadorApi::map_status("complete"), SwapStatus::Complete);
        assert_eq!(TrocadorApi::map_status("failed"), SwapStatus::Failed);
        assert_eq!(TrocadorApi::map_status("expired"), SwapStatus::Expired);
        assert_eq!(TrocadorApi::map_status("halted"), SwapStatus::Waiting);
        assert_eq!(TrocadorApi::map_status(""), SwapStatus::Waiting);
    }

    #[test]
    fn parse_responses() {
        let rate: TrocadorRate =
            serde_json::from_value(json!({"success": true, "amount_to": "2.5", "rate": 250, "id": 77})).unwrap();
        assert!(rate.success);
        assert_eq!(rate.amount_to, dec!(2.5));
        assert_eq!(rate.id, "77");
        let trade: TrocadorTrade = serde_json::from_value(json!({
            "success": true,
            "trade_id": "abc123",
            "address_provider": "bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh",
            "amount_to": 2.49
        }))
        .unwrap();
        assert_eq!(trade.trade_id, "abc123");
        assert_eq!(trade.amount_to, dec!(2.49));
        let bad = serde_json::from_value::<TrocadorTrade>(json!({"success": true, "trade_id": "x"}));
        assert!(bad.is_err());
    }

    #[tokio::test]
    async fn unreachable_provider_is_an_error() {
        let _ = env_logger::try_init();
        let config = ProviderConfig::new("http://127.0.0.1:9", "key").with_timeout(std::time::Duration::from_secs(2));
        let api = TrocadorApi::new(config).unwrap();
        let err = api.quote(Currency::Btc, Amount::from(dec!(0.01))).await.unwrap_err();
        assert!(err.is_unavailable(), "{err}");
        assert!(api.check_status("abc").await.is_err());
    }
}
