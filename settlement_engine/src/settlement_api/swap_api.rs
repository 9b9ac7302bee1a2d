//! # Swap orchestration
//!
//! [`SwapOrchestrator`] turns a customer's payment coin into the reference currency by way of an external exchange
//! provider.
//!
//! * Payments in the reference currency short-circuit to the `direct` pseudo-provider. The rate is 1:1, the deposit
//!   address is the destination address, and no external call is made.
//! * Otherwise the configured providers are tried in preference order. The first one to return a well-formed
//!   response wins. A provider that errors, times out, or returns nonsense is skipped, never retried.
//! * If every provider fails (or none is configured) and the orchestrator is in test mode, the `mock` provider
//!   synthesizes a plausible quote or swap so the rest of the pipeline can be exercised without credentials. In
//!   production mode the call fails with [`SwapError::ProviderUnavailable`].
use std::fmt::Debug;

use chrono::{Duration, Utc};
use exchange_tools::{ChangeNowApi, ExchangeApiError, ExchangeConfig, TrocadorApi};
use log::*;
use rust_decimal::Decimal;
use tsg_common::{Amount, Currency, SwapOrder, SwapQuote, SwapStatus};

use crate::{
    helpers::{is_plausible_deposit_address, mock_deposit_address, random_hex},
    settlement_api::errors::SwapError,
    traits::SwapExchange,
};

pub const DIRECT_PROVIDER: &str = "direct";
pub const MOCK_PROVIDER: &str = "mock";

const DIRECT_EXPIRY_HOURS: i64 = 24;
const MOCK_QUOTE_EXPIRY_MINUTES: i64 = 30;
const MOCK_SWAP_EXPIRY_HOURS: i64 = 24;

#[derive(Clone)]
pub enum SwapProvider {
    Direct,
    Trocador(TrocadorApi),
    ChangeNow(ChangeNowApi),
    Mock,
}

impl SwapProvider {
    pub fn name(&self) -> &'static str {
        match self {
            SwapProvider::Direct => DIRECT_PROVIDER,
            SwapProvider::Trocador(_) => TrocadorApi::NAME,
            SwapProvider::ChangeNow(_) => ChangeNowApi::NAME,
            SwapProvider::Mock => MOCK_PROVIDER,
        }
    }

    /// True for providers backed by a real exchange.
    pub fn is_external(&self) -> bool {
        matches!(self, SwapProvider::Trocador(_) | SwapProvider::ChangeNow(_))
    }
}

impl Debug for SwapProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Approximate XMR per unit of each coin. Only used by the mock provider.
fn mock_rate(currency: Currency) -> Decimal {
    match currency {
        Currency::Btc => Decimal::new(250, 0),
        Currency::Eth => Decimal::new(15, 0),
        Currency::Sol => Decimal::new(8, 1),
        Currency::Ltc => Decimal::new(5, 1),
        Currency::Usdt | Currency::Usdc => Decimal::new(6, 3),
        _ => Decimal::ONE,
    }
}

#[derive(Clone)]
pub struct SwapOrchestrator {
    providers: Vec<SwapProvider>,
    testnet: bool,
}

impl Debug for SwapOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SwapOrchestrator ({:?}, testnet: {})", self.providers, self.testnet)
    }
}

impl SwapOrchestrator {
    /// Creates an orchestrator that tries `providers` in the given order. `Direct` and `Mock` entries are ignored here,
    /// since they are selected implicitly.
    pub fn new(providers: Vec<SwapProvider>, testnet: bool) -> Self {
        let providers = providers.into_iter().filter(SwapProvider::is_external).collect();
        Self { providers, testnet }
    }

    /// Builds the provider list from configuration. `preference` names providers in the order they should be tried;
    /// providers without an API key are left out.
    pub fn from_config(config: &ExchangeConfig, preference: &[String], testnet: bool) -> Result<Self, ExchangeApiError> {
        let mut providers = Vec::new();
        for name in preference {
            match name.trim().to_ascii_lowercase().as_str() {
                TrocadorApi::NAME => match &config.trocador {
                    Some(c) => providers.push(SwapProvider::Trocador(TrocadorApi::new(c.clone())?)),
                    None => info!("🔀️ Trocador is not configured. Skipping it"),
                },
                ChangeNowApi::NAME => match &config.changenow {
                    Some(c) => providers.push(SwapProvider::ChangeNow(ChangeNowApi::new(c.clone())?)),
                    None => info!("🔀️ ChangeNow is not configured. Skipping it"),
                },
                other => warn!("🔀️ Unknown swap provider '{other}' in the preference list. Ignoring it"),
            }
        }
        if providers.is_empty() && !testnet {
            warn!("🔀️ No swap providers are configured. Only direct payments will work");
        }
        Ok(Self::new(providers, testnet))
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(SwapProvider::name).collect()
    }

    pub fn is_testnet(&self) -> bool {
        self.testnet
    }

    fn validate(&self, from: Currency, amount: Amount) -> Result<(), SwapError> {
        if !from.is_crypto() {
            return Err(SwapError::UnsupportedCurrency(from.code().to_string()));
        }
        if !amount.is_positive() {
            return Err(SwapError::NonPositiveAmount(amount));
        }
        if from.is_reference() {
            return Ok(());
        }
        match from.min_swap_amount() {
            Some(minimum) if amount < minimum => {
                Err(SwapError::BelowMinimum { currency: from.code().to_string(), amount, minimum })
            },
            _ => Ok(()),
        }
    }

    pub async fn quote(&self, from: Currency, amount: Amount) -> Result<SwapQuote, SwapError> {
        self.validate(from, amount)?;
        if from.is_reference() {
            return Ok(direct_quote(amount));
        }
        let mut failures = Vec::new();
        for provider in &self.providers {
            let result = match provider {
                SwapProvider::Trocador(api) => api.quote(from, amount).await,
                SwapProvider::ChangeNow(api) => api.quote(from, amount).await,
                _ => continue,
            };
            match result {
                Ok(quote) if quote.to_amount.is_positive() => {
                    debug!("🔀️ {} quoted {amount} {from} = {} XMR", provider.name(), quote.to_amount);
                    return Ok(quote);
                },
                Ok(quote) => {
                    warn!(
                        "🔀️ {} returned a malformed quote ({} XMR). Trying the next provider",
                        provider.name(),
                        quote.to_amount
                    );
                    failures.push(format!("{}: malformed quote", provider.name()));
                },
                Err(e) => {
                    warn!("🔀️ {} could not quote {amount} {from}. {e}", provider.name());
                    failures.push(format!("{}: {e}", provider.name()));
                },
            }
        }
        if self.testnet {
            info!("🔀️ Using the mock provider to quote {amount} {from}");
            return Ok(mock_quote(from, amount));
        }
        Err(unavailable(failures))
    }

    pub async fn create_swap(
        &self,
        from: Currency,
        amount: Amount,
        destination: &str,
        refund: Option<&str>,
    ) -> Result<SwapOrder, SwapError> {
        self.validate(from, amount)?;
        if from.is_reference() {
            return Ok(direct_swap(amount, destination));
        }
        let mut failures = Vec::new();
        for provider in &self.providers {
            let result = match provider {
                SwapProvider::Trocador(api) => api.create_swap(from, amount, destination, refund).await,
                SwapProvider::ChangeNow(api) => api.create_swap(from, amount, destination, refund).await,
                _ => continue,
            };
            match result {
                Ok(swap) if is_well_formed(&swap) => {
                    info!("🔀️ {} swap {} created for {amount} {from}", provider.name(), swap.swap_id);
                    return Ok(swap);
                },
                Ok(swap) => {
                    warn!(
                        "🔀️ {} returned a malformed swap (id '{}', deposit '{}', amount {}). Trying the next provider",
                        provider.name(),
                        swap.swap_id,
                        swap.deposit_address,
                        swap.expected_amount
                    );
                    failures.push(format!("{}: malformed swap", provider.name()));
                },
                Err(e) => {
                    warn!("🔀️ {} could not create a swap for {amount} {from}. {e}", provider.name());
                    failures.push(format!("{}: {e}", provider.name()));
                },
            }
        }
        if self.testnet {
            info!("🔀️ Using the mock provider to swap {amount} {from}");
            return Ok(mock_swap(from, amount, destination, refund));
        }
        Err(unavailable(failures))
    }

    /// Asks the provider that owns the swap for its status. `direct` and `mock` swaps always report `Complete`.
    ///
    /// A transport failure is an error, not a `Failed` status. The order is left alone and checked again later.
    pub async fn check_status(&self, swap_id: &str, provider: &str) -> Result<SwapStatus, SwapError> {
        let name = provider.trim().to_ascii_lowercase();
        if name == DIRECT_PROVIDER || name == MOCK_PROVIDER {
            return Ok(SwapStatus::Complete);
        }
        let Some(owner) = self.providers.iter().find(|p| p.name() == name) else {
            return Err(SwapError::ProviderUnavailable(format!("Provider '{provider}' is not configured")));
        };
        let result = match owner {
            SwapProvider::Trocador(api) => api.check_status(swap_id).await,
            SwapProvider::ChangeNow(api) => api.check_status(swap_id).await,
            _ => Ok(SwapStatus::Complete),
        };
        result.map_err(|e| {
            warn!("🔀️ Could not check status of {provider} swap {swap_id}. {e}");
            SwapError::ProviderUnavailable(format!("{provider}: {e}"))
        })
    }
}

impl SwapExchange for SwapOrchestrator {
    async fn quote(&self, from: Currency, amount: Amount) -> Result<SwapQuote, SwapError> {
        SwapOrchestrator::quote(self, from, amount).await
    }

    async fn create_swap(
        &self,
        from: Currency,
        amount: Amount,
        destination: &str,
        refund: Option<&str>,
    ) -> Result<SwapOrder, SwapError> {
        SwapOrchestrator::create_swap(self, from, amount, destination, refund).await
    }

    async fn check_status(&self, swap_id: &str, provider: &str) -> Result<SwapStatus, SwapError> {
        SwapOrchestrator::check_status(self, swap_id, provider).await
    }
}

fn unavailable(failures: Vec<String>) -> SwapError {
    if failures.is_empty() {
        SwapError::ProviderUnavailable("No swap providers are configured".to_string())
    } else {
        SwapError::ProviderUnavailable(failures.join("; "))
    }
}

fn is_well_formed(swap: &SwapOrder) -> bool {
    !swap.swap_id.trim().is_empty() &&
        swap.expected_amount.is_positive() &&
        is_plausible_deposit_address(swap.from_currency, &swap.deposit_address)
}

fn direct_quote(amount: Amount) -> SwapQuote {
    SwapQuote {
        from_currency: Currency::REFERENCE,
        to_currency: Currency::REFERENCE,
        from_amount: amount,
        to_amount: amount,
        rate: Decimal::ONE,
        provider: DIRECT_PROVIDER.to_string(),
        quote_id: DIRECT_PROVIDER.to_string(),
        expires_at: Utc::now() + Duration::hours(DIRECT_EXPIRY_HOURS),
    }
}

fn direct_swap(amount: Amount, destination: &str) -> SwapOrder {
    let now = Utc::now();
    SwapOrder {
        swap_id: DIRECT_PROVIDER.to_string(),
        from_currency: Currency::REFERENCE,
        to_currency: Currency::REFERENCE,
        from_amount: amount,
        deposit_address: destination.to_string(),
        expected_amount: amount,
        destination_address: destination.to_string(),
        refund_address: None,
        provider: DIRECT_PROVIDER.to_string(),
        status: SwapStatus::Waiting,
        expires_at: now + Duration::hours(DIRECT_EXPIRY_HOURS),
        created_at: now,
    }
}

fn mock_quote(from: Currency, amount: Amount) -> SwapQuote {
    let rate = mock_rate(from);
    SwapQuote {
        from_currency: from,
        to_currency: Currency::REFERENCE,
        from_amount: amount,
        to_amount: (amount * rate).round_down(Currency::REFERENCE.precision()),
        rate,
        provider: MOCK_PROVIDER.to_string(),
        quote_id: "mock_quote".to_string(),
        expires_at: Utc::now() + Duration::minutes(MOCK_QUOTE_EXPIRY_MINUTES),
    }
}

fn mock_swap(from: Currency, amount: Amount, destination: &str, refund: Option<&str>) -> SwapOrder {
    let quote = mock_quote(from, amount);
    let now = Utc::now();
    SwapOrder {
        swap_id: format!("mock_{}", random_hex(8)),
        from_currency: from,
        to_currency: Currency::REFERENCE,
        from_amount: amount,
        deposit_address: mock_deposit_address(from),
        expected_amount: quote.to_amount,
        destination_address: destination.to_string(),
        refund_address: refund.map(String::from),
        provider: MOCK_PROVIDER.to_string(),
        status: SwapStatus::Waiting,
        expires_at: now + Duration::hours(MOCK_SWAP_EXPIRY_HOURS),
        created_at: now,
    }
}

#[cfg(test)]
mod test {
    use exchange_tools::ProviderConfig;
    use rust_decimal_macros::dec;

    use super::*;

    const WALLET: &str = "44AFFq5kSiGBoZ4NMDwYtN18obc8AemS33DBLWs3H7otXft3XjrpDtQGv7SqSsaBYBb98uNbr2VBBEt7f2wfn3RVGQBEP3A";

    fn amt(d: Decimal) -> Amount {
        Amount::from(d)
    }

    fn dead_providers() -> Vec<SwapProvider> {
        let troc = ProviderConfig::new("http://127.0.0.1:9", "key").with_timeout(std::time::Duration::from_secs(2));
        let cn = ProviderConfig::new("http://127.0.0.1:9", "key").with_timeout(std::time::Duration::from_secs(2));
        vec![
            SwapProvider::Trocador(TrocadorApi::new(troc).unwrap()),
            SwapProvider::ChangeNow(ChangeNowApi::new(cn).unwrap()),
        ]
    }

    #[tokio::test]
    async fn reference_currency_is_direct() {
        let swaps = SwapOrchestrator::new(vec![], false);
        let quote = swaps.quote(Currency::Xmr, amt(dec!(2.5))).await.unwrap();
        assert_eq!(quote.provider, DIRECT_PROVIDER);
        assert_eq!(quote.rate, Decimal::ONE);
        assert_eq!(quote.to_amount, amt(dec!(2.5)));
        let swap = swaps.create_swap(Currency::Xmr, amt(dec!(2.5)), WALLET, None).await.unwrap();
        assert_eq!(swap.provider, DIRECT_PROVIDER);
        assert_eq!(swap.deposit_address, WALLET);
        assert_eq!(swap.status, SwapStatus::Waiting);
        assert_eq!(swaps.check_status(&swap.swap_id, DIRECT_PROVIDER).await.unwrap(), SwapStatus::Complete);
    }

    #[tokio::test]
    async fn validation() {
        let swaps = SwapOrchestrator::new(vec![], true);
        let err = swaps.quote(Currency::Btc, amt(dec!(0))).await.unwrap_err();
        assert!(matches!(err, SwapError::NonPositiveAmount(_)));
        let err = swaps.quote(Currency::Usd, amt(dec!(10))).await.unwrap_err();
        assert!(matches!(err, SwapError::UnsupportedCurrency(_)));
        let err = swaps.create_swap(Currency::Usdt, amt(dec!(9.99)), WALLET, None).await.unwrap_err();
        assert!(matches!(err, SwapError::BelowMinimum { .. }));
    }

    #[tokio::test]
    async fn mock_provider_in_test_mode() {
        let swaps = SwapOrchestrator::new(vec![], true);
        let quote = swaps.quote(Currency::Btc, amt(dec!(0.01))).await.unwrap();
        assert_eq!(quote.provider, MOCK_PROVIDER);
        assert_eq!(quote.to_amount, amt(dec!(2.5)));
        let swap = swaps.create_swap(Currency::Eth, amt(dec!(0.2)), WALLET, None).await.unwrap();
        assert_eq!(swap.provider, MOCK_PROVIDER);
        assert!(swap.swap_id.starts_with("mock_"));
        assert_eq!(swap.swap_id.len(), 21);
        assert_ne!(swap.deposit_address, WALLET);
        assert!(is_plausible_deposit_address(Currency::Eth, &swap.deposit_address));
        assert_eq!(swap.expected_amount, amt(dec!(3)));
        assert_eq!(swap.status, SwapStatus::Waiting);
        assert_eq!(swaps.check_status(&swap.swap_id, MOCK_PROVIDER).await.unwrap(), SwapStatus::Complete);
    }

    #[tokio::test]
    async fn production_mode_fails_without_providers() {
        let swaps = SwapOrchestrator::new(vec![], false);
        let err = swaps.quote(Currency::Btc, amt(dec!(0.01))).await.unwrap_err();
        assert!(matches!(err, SwapError::ProviderUnavailable(_)));
        let err = swaps.create_swap(Currency::Sol, amt(dec!(1)), WALLET, None).await.unwrap_err();
        assert!(matches!(err, SwapError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn falls_back_past_unreachable_providers() {
        let _ = env_logger::try_init();
        let swaps = SwapOrchestrator::new(dead_providers(), true);
        assert_eq!(swaps.provider_names(), vec!["trocador", "changenow"]);
        let swap = swaps.create_swap(Currency::Ltc, amt(dec!(1)), WALLET, None).await.unwrap();
        assert_eq!(swap.provider, MOCK_PROVIDER);

        let swaps = SwapOrchestrator::new(dead_providers(), false);
        match swaps.create_swap(Currency::Ltc, amt(dec!(1)), WALLET, None).await {
            Err(SwapError::ProviderUnavailable(msg)) => {
                assert!(msg.contains("trocador"));
                assert!(msg.contains("changenow"));
            },
            other => panic!("Expected ProviderUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_check_failures_are_errors() {
        let swaps = SwapOrchestrator::new(dead_providers(), true);
        let err = swaps.check_status("abc", "trocador").await.unwrap_err();
        assert!(matches!(err, SwapError::ProviderUnavailable(_)));
        let err = swaps.check_status("abc", "sideshift").await.unwrap_err();
        assert!(matches!(err, SwapError::ProviderUnavailable(_)));
    }

    #[test]
    fn well_formed_swaps() {
        let mut swap = mock_swap(Currency::Btc, amt(dec!(0.01)), WALLET, None);
        assert!(is_well_formed(&swap));
        swap.deposit_address = WALLET.to_string();
        assert!(!is_well_formed(&swap));
        let mut swap = mock_swap(Currency::Btc, amt(dec!(0.01)), WALLET, None);
        swap.expected_amount = Amount::ZERO;
        assert!(!is_well_formed(&swap));
    }
}
