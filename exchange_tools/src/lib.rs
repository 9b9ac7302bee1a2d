//! HTTP clients for the external services the settlement gateway depends on.
//!
//! * [`CoinGeckoApi`] fetches fiat prices for the supported crypto currencies.
//! * [`TrocadorApi`] and [`ChangeNowApi`] quote, create and track swaps into the reference currency. Each adapter
//!   maps its provider's status vocabulary onto [`tsg_common::SwapStatus`].
//! * [`MoneroWalletRpc`] reads incoming payments from the platform's monero-wallet-rpc instance.
//!
//! None of the clients retry. A failed call is reported to the caller, who decides whether to fall back to another
//! provider or to wait for the next reconciliation pass.
mod api;
mod changenow;
mod coingecko;
mod config;
mod data_objects;
mod error;
pub mod helpers;
mod monero_wallet;
mod trocador;

pub use api::RestClient;
pub use changenow::ChangeNowApi;
pub use coingecko::CoinGeckoApi;
pub use config::{ExchangeConfig, ProviderConfig, RateApiConfig, WalletRpcConfig};
pub use error::ExchangeApiError;
pub use monero_wallet::MoneroWalletRpc;
pub use trocador::TrocadorApi;
