use std::{env, time::Duration};

use log::*;
use tsg_common::Secret;

pub const DEFAULT_COINGECKO_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_TROCADOR_URL: &str = "https://trocador.app/api";
pub const DEFAULT_CHANGENOW_URL: &str = "https://api.changenow.io/v2";
pub const DEFAULT_RATE_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_WALLET_RPC_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RateApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for RateApiConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_COINGECKO_URL.to_string(), timeout: DEFAULT_RATE_TIMEOUT }
    }
}

/// Connection details for one swap provider. A provider without an API key is never configured.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self { base_url: base_url.to_string(), api_key: Secret::new(api_key.to_string()), timeout: DEFAULT_PROVIDER_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct WalletRpcConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Secret<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct ExchangeConfig {
    pub rates: RateApiConfig,
    pub trocador: Option<ProviderConfig>,
    pub changenow: Option<ProviderConfig>,
    pub wallet_rpc: Option<WalletRpcConfig>,
}

impl ExchangeConfig {
    pub fn new_from_env_or_default() -> Self {
        let rate_url = env::var("TSG_COINGECKO_URL").unwrap_or_else(|_| {
            info!("🪛️ TSG_COINGECKO_URL not set, using {DEFAULT_COINGECKO_URL}");
            DEFAULT_COINGECKO_URL.to_string()
        });
        let rate_timeout = timeout_from_env("TSG_RATE_TIMEOUT", DEFAULT_RATE_TIMEOUT);
        let rates = RateApiConfig { base_url: rate_url, timeout: rate_timeout };
        let provider_timeout = timeout_from_env("TSG_PROVIDER_TIMEOUT", DEFAULT_PROVIDER_TIMEOUT);
        let trocador = provider_from_env("TSG_TROCADOR_API_KEY", "TSG_TROCADOR_URL", DEFAULT_TROCADOR_URL)
            .map(|p| p.with_timeout(provider_timeout));
        let changenow = provider_from_env("TSG_CHANGENOW_API_KEY", "TSG_CHANGENOW_URL", DEFAULT_CHANGENOW_URL)
            .map(|p| p.with_timeout(provider_timeout));
        let wallet_rpc = env::var("TSG_WALLET_RPC_URL").ok().filter(|s| !s.trim().is_empty()).map(|url| {
            let username = env::var("TSG_WALLET_RPC_USER").ok();
            let password = Secret::new(env::var("TSG_WALLET_RPC_PASSWORD").unwrap_or_default());
            WalletRpcConfig { url, username, password, timeout: DEFAULT_WALLET_RPC_TIMEOUT }
        });
        if wallet_rpc.is_none() {
            warn!("🪛️ TSG_WALLET_RPC_URL not set. Commission invoice payments will not be detected automatically.");
        }
        Self { rates, trocador, changenow, wallet_rpc }
    }
}

fn provider_from_env(key_var: &str, url_var: &str, default_url: &str) -> Option<ProviderConfig> {
    let api_key = match env::var(key_var) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            info!("🪛️ {key_var} not set. This swap provider will not be used.");
            return None;
        },
    };
    let url = env::var(url_var).unwrap_or_else(|_| default_url.to_string());
    Some(ProviderConfig::new(&url, &api_key))
}

fn timeout_from_env(var: &str, default: Duration) -> Duration {
    env::var(var)
        .ok()
        .and_then(|s| {
            s.parse::<u64>()
                .map_err(|e| warn!("🪛️ Invalid value for {var}: {s}. {e}. Using {}s", default.as_secs()))
                .ok()
        })
        .map(Duration::from_secs)
        .unwrap_or(default)
}
