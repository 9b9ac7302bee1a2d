use log::*;
use reqwest::{header::HeaderMap, Method};
use serde_json::json;
use tsg_common::{Amount, Currency};

use crate::{
    data_objects::{GetPaymentsResult, JsonRpcRequest, JsonRpcResponse},
    ExchangeApiError,
    RestClient,
    WalletRpcConfig,
};

/// Atomic units per XMR
const PICONERO_DECIMALS: u32 = 12;

/// A minimal client for `monero-wallet-rpc`, used to detect commission payments into the platform wallet.
#[derive(Clone)]
pub struct MoneroWalletRpc {
    config: WalletRpcConfig,
    client: RestClient,
}

impl MoneroWalletRpc {
    pub fn new(config: WalletRpcConfig) -> Result<Self, ExchangeApiError> {
        let client = RestClient::new(&config.url, config.timeout, HeaderMap::new())?;
        Ok(Self { config, client })
    }

    /// Total amount, in XMR, received against the given payment id.
    pub async fn received_for_payment_id(&self, payment_id: &str) -> Result<Amount, ExchangeApiError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: "0",
            method: "get_payments",
            params: json!({ "payment_id": payment_id }),
        };
        let auth = self.config.username.as_deref().map(|u| (u, self.config.password.reveal().as_str()));
        let response = self
            .client
            .rest_query_with_auth::<JsonRpcResponse<GetPaymentsResult>, _>(
                Method::POST,
                "/json_rpc",
                &[],
                Some(request),
                auth,
            )
            .await?;
        let total = Self::sum_payments(response)?;
        trace!("🧾️ Wallet reports {total} {} received for payment id {payment_id}", Currency::REFERENCE);
        Ok(total)
    }

    fn sum_payments(response: JsonRpcResponse<GetPaymentsResult>) -> Result<Amount, ExchangeApiError> {
        if let Some(e) = response.error {
            return Err(ExchangeApiError::RpcError { code: e.code, message: e.message });
        }
        let result = response
            .result
            .ok_or_else(|| ExchangeApiError::MalformedResponse("get_payments returned no result".into()))?;
        Ok(result.payments.iter().map(|p| Amount::from_atomic_units(p.amount, PICONERO_DECIMALS)).sum())
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn payments_are_summed_exactly() {
        let response: JsonRpcResponse<GetPaymentsResult> = serde_json::from_value(json!({
            "id": "0",
            "jsonrpc": "2.0",
            "result": {"payments": [
                {"amount": 1_500_000_000_000u64, "tx_hash": "aa", "block_height": 10},
                {"amount": 1_000_000_000_000u64, "tx_hash": "bb", "block_height": 11},
                {"amount": 1u64, "tx_hash": "cc", "block_height": 12}
            ]}
        }))
        .unwrap();
        let total = MoneroWalletRpc::sum_payments(response).unwrap();
        assert_eq!(total, Amount::from(dec!(2.500000000001)));
    }

    #[test]
    fn no_payments_is_zero() {
        let response: JsonRpcResponse<GetPaymentsResult> =
            serde_json::from_value(json!({"id": "0", "jsonrpc": "2.0", "result": {}})).unwrap();
        assert_eq!(MoneroWalletRpc::sum_payments(response).unwrap(), Amount::ZERO);
    }

    #[test]
    fn rpc_errors_are_reported() {
        let response: JsonRpcResponse<GetPaymentsResult> = serde_json::from_value(json!({
            "id": "0",
            "jsonrpc": "2.0",
            "error": {"code": -5, "message": "Payment ID has invalid format"}
        }))
        .unwrap();
        let err = MoneroWalletRpc::sum_payments(response).unwrap_err();
        assert!(matches!(err, ExchangeApiError::RpcError { code: -5, .. }));
    }
}
