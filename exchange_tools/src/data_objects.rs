//! Raw response shapes for the provider APIs. These never leave the crate; the adapters normalize them into
//! [`tsg_common::SwapQuote`] and [`tsg_common::SwapOrder`].
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::helpers::{flexible_decimal, flexible_string};

#[derive(Debug, Clone, Deserialize)]
pub struct TrocadorRate {
    #[serde(default)]
    pub success: bool,
    #[serde(deserialize_with = "flexible_decimal")]
    pub amount_to: Decimal,
    #[serde(default, deserialize_with = "flexible_string")]
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrocadorNewTrade<'a> {
    pub api_key: &'a str,
    pub ticker_from: String,
    pub ticker_to: String,
    pub amount_from: String,
    pub address: &'a str,
    pub refund: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrocadorTrade {
    #[serde(default)]
    pub success: bool,
    #[serde(deserialize_with = "flexible_string")]
    pub trade_id: String,
    pub address_provider: String,
    #[serde(deserialize_with = "flexible_decimal")]
    pub amount_to: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNowEstimate {
    #[serde(deserialize_with = "flexible_decimal")]
    pub to_amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNowNewExchange<'a> {
    pub from_currency: String,
    pub to_currency: String,
    pub from_amount: String,
    pub address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_address: Option<&'a str>,
    pub flow: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNowExchange {
    #[serde(deserialize_with = "flexible_string")]
    pub id: String,
    pub payin_address: String,
    #[serde(deserialize_with = "flexible_decimal")]
    pub to_amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: &'static str,
    pub method: &'static str,
    pub params: P,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse<R> {
    pub result: Option<R>,
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetPaymentsResult {
    #[serde(default)]
    pub payments: Vec<WalletPayment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletPayment {
    /// Atomic units (piconero)
    pub amount: u64,
    #[serde(default)]
    pub tx_hash: String,
    #[serde(default)]
    pub block_height: u64,
}
