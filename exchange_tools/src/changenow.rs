use chrono::{Duration, Utc};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method,
};
use tsg_common::{Amount, Currency, SwapOrder, SwapQuote, SwapStatus};

use crate::{
    data_objects::{ChangeNowEstimate, ChangeNowExchange, ChangeNowNewExchange, StatusResponse},
    ExchangeApiError,
    ProviderConfig,
    RestClient,
};

const QUOTE_LIFETIME_MINUTES: i64 = 10;
const SWAP_LIFETIME_HOURS: i64 = 24;

/// Adapter for the ChangeNow v2 exchange API. The API key travels in the `x-changenow-api-key` header.
#[derive(Clone)]
pub struct ChangeNowApi {
    client: RestClient,
}

impl ChangeNowApi {
    pub const NAME: &'static str = "changenow";

    pub fn new(config: ProviderConfig) -> Result<Self, ExchangeApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let key = HeaderValue::from_str(config.api_key.reveal().as_str())
            .map_err(|e| ExchangeApiError::Initialization(e.to_string()))?;
        headers.insert("x-changenow-api-key", key);
        let client = RestClient::new(&config.base_url, config.timeout, headers)?;
        Ok(Self { client })
    }

    pub async fn quote(&self, from: Currency, amount: Amount) -> Result<SwapQuote, ExchangeApiError> {
        let to = Currency::REFERENCE;
        let params = [
            ("fromCurrency", from.ticker()),
            ("toCurrency", to.ticker()),
            ("fromAmount", amount.to_string()),
            ("flow", "standard".to_string()),
        ];
        debug!("🔀️ Requesting ChangeNow estimate for {amount} {from}");
        let estimate = self
            .client
            .rest_query::<ChangeNowEstimate, ()>(Method::GET, "/exchange/estimated-amount", &params, None)
            .await?;
        let to_amount = Amount::from(estimate.to_amount);
        let rate = to_amount
            .checked_div(amount.value())
            .ok_or_else(|| ExchangeApiError::MalformedResponse("cannot derive rate from zero amount".into()))?;
        Ok(SwapQuote {
            from_currency: from,
            to_currency: to,
            from_amount: amount,
            to_amount,
            rate: rate.value(),
            provider: Self::NAME.to_string(),
            quote_id: String::default(),
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
        let body = ChangeNowNewExchange {
            from_currency: from.ticker(),
            to_currency: to.ticker(),
            from_amount: amount.to_string(),
            address: destination,
            refund_address: refund,
            flow: "standard",
        };
        debug!("🔀️ Creating ChangeNow exchange for {amount} {from}");
        let exchange = self.client.rest_query::<ChangeNowExchange, _>(Method::POST, "/exchange", &[], Some(body)).await?;
        let now = Utc::now();
        info!("🔀️ ChangeNow exchange {} created", exchange.id);
        Ok(SwapOrder {
            swap_id: exchange.id,
            from_currency: from,
            to_currency: to,
            from_amount: amount,
            deposit_address: exchange.payin_address,
            expected_amount: Amount::from(exchange.to_amount),
            destination_address: destination.to_string(),
            refund_address: refund.map(String::from),
            provider: Self::NAME.to_string(),
            status: SwapStatus::Waiting,
            expires_at: now + Duration::hours(SWAP_LIFETIME_HOURS),
            created_at: now,
        })
    }

    pub async fn check_status(&self, swap_id: &str) -> Result<SwapStatus, ExchangeApiError> {
        let params = [("id", swap_id.to_string())];
        let response =
            self.client.rest_query::<StatusResponse, ()>(Method::GET, "/exchange/by-id", &params, None).await?;
        let status = Self::map_status(&response.status);
        trace!("🔀️ ChangeNow exchange {swap_id} reports '{}' ({status})", response.status);
        Ok(status)
    }

    /// Maps ChangeNow's status vocabulary onto [`SwapStatus`]. Anything unrecognised is `Waiting`.
    pub fn map_status(status: &str) -> SwapStatus {
        match status.trim().to_ascii_lowercase().as_str() {
            "new" | "waiting" => SwapStatus::Waiting,
            "confirming" => SwapStatus::Confirming,
            "exchanging" | "sending" => SwapStatus::Exchanging,
            "finished" => SwapStatus::Complete,
            "failed" | "refunded" => SwapStatus::Failed,
            "expired" => SwapStatus::Expired,
            other => {
                debug!("🔀️ Unknown ChangeNow status '{other}'. Treating it as waiting");
                SwapStatus::Waiting
            },
        }
    }
}
