//! In-process stand-ins for the external services the engine depends on.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
        Mutex,
    },
};

use chrono::Utc;
use rust_decimal::Decimal;
use tsg_common::{Amount, Currency, RateTable, SwapOrder, SwapQuote, SwapStatus};

use crate::{
    traits::{ExchangeRateError, ExchangeRates, PaymentReceiptError, PaymentReceipts, SwapExchange},
    SwapError,
    SwapOrchestrator,
};

/// Always returns the same rate table.
#[derive(Debug, Clone)]
pub struct FixedRates(RateTable);

impl FixedRates {
    pub fn new(table: RateTable) -> Self {
        Self(table)
    }

    /// Round-number prices for every supported coin in every supported fiat currency.
    pub fn standard() -> Self {
        let usd = [
            (Currency::Xmr, 150),
            (Currency::Btc, 60_000),
            (Currency::Eth, 3_000),
            (Currency::Sol, 150),
            (Currency::Ltc, 75),
            (Currency::Usdt, 1),
            (Currency::Usdc, 1),
        ];
        let mut table = RateTable::new(Utc::now());
        for (coin, price) in usd {
            let price = Decimal::from(price);
            table.set_price(coin, Currency::Usd, price);
            table.set_price(coin, Currency::Eur, price * Decimal::new(9, 1));
            table.set_price(coin, Currency::Gbp, price * Decimal::new(8, 1));
        }
        Self(table)
    }
}

impl ExchangeRates for FixedRates {
    async fn fetch_rates(&self, _cryptos: &[Currency], _fiats: &[Currency]) -> Result<RateTable, ExchangeRateError> {
        Ok(self.0.clone())
    }
}

/// A rate source that is always down.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingRates;

impl ExchangeRates for FailingRates {
    async fn fetch_rates(&self, _cryptos: &[Currency], _fiats: &[Currency]) -> Result<RateTable, ExchangeRateError> {
        Err(ExchangeRateError::Unavailable("connection refused".to_string()))
    }
}

/// A swap exchange whose swaps move through whatever statuses the test sets.
///
/// Quotes and swaps are produced by a test-mode [`SwapOrchestrator`], so they look like the mock provider's. Every
/// swap starts out `Waiting` and stays there until [`ScriptedSwaps::set_status`] is called.
#[derive(Debug, Clone)]
pub struct ScriptedSwaps {
    inner: SwapOrchestrator,
    statuses: Arc<Mutex<HashMap<String, SwapStatus>>>,
    creation_fails: Arc<AtomicBool>,
    status_checks_fail: Arc<AtomicBool>,
}

impl Default for ScriptedSwaps {
    fn default() -> Self {
        Self {
            inner: SwapOrchestrator::new(vec![], true),
            statuses: Arc::new(Mutex::new(HashMap::new())),
            creation_fails: Arc::new(AtomicBool::new(false)),
            status_checks_fail: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl ScriptedSwaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, swap_id: &str, status: SwapStatus) {
        self.statuses.lock().unwrap().insert(swap_id.to_string(), status);
    }

    /// When set, every provider is "down" for swap creation.
    pub fn fail_creation(&self, fail: bool) {
        self.creation_fails.store(fail, Ordering::SeqCst);
    }

    /// When set, status checks fail as if the provider could not be reached.
    pub fn fail_status_checks(&self, fail: bool) {
        self.status_checks_fail.store(fail, Ordering::SeqCst);
    }

    pub fn swap_count(&self) -> usize {
        self.statuses.lock().unwrap().len()
    }
}

impl SwapExchange for ScriptedSwaps {
    async fn quote(&self, from: Currency, amount: Amount) -> Result<SwapQuote, SwapError> {
        self.inner.quote(from, amount).await
    }

    async fn create_swap(
        &self,
        from: Currency,
        amount: Amount,
        destination: &str,
        refund: Option<&str>,
    ) -> Result<SwapOrder, SwapError> {
        if self.creation_fails.load(Ordering::SeqCst) && !from.is_reference() {
            return Err(SwapError::ProviderUnavailable("scripted outage".to_string()));
        }
        let swap = self.inner.create_swap(from, amount, destination, refund).await?;
        self.set_status(&swap.swap_id, swap.status);
        Ok(swap)
    }

    async fn check_status(&self, swap_id: &str, _provider: &str) -> Result<SwapStatus, SwapError> {
        if self.status_checks_fail.load(Ordering::SeqCst) {
            return Err(SwapError::ProviderUnavailable("scripted outage".to_string()));
        }
        let status = self.statuses.lock().unwrap().get(swap_id).copied().unwrap_or(SwapStatus::Waiting);
        Ok(status)
    }
}

/// Payments "received" by the platform wallet, keyed by payment id.
#[derive(Debug, Clone, Default)]
pub struct FakeReceipts {
    received: Arc<Mutex<HashMap<String, Amount>>>,
    unreadable: Arc<Mutex<Vec<String>>>,
}

impl FakeReceipts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receive(&self, payment_id: &str, amount: Amount) {
        let mut received = self.received.lock().unwrap();
        let total = received.entry(payment_id.to_string()).or_insert(Amount::ZERO);
        *total += amount;
    }

    /// Reading payments for this id fails.
    pub fn make_unreadable(&self, payment_id: &str) {
        self.unreadable.lock().unwrap().push(payment_id.to_string());
    }
}

impl PaymentReceipts for FakeReceipts {
    async fn received_for_payment_id(&self, payment_id: &str) -> Result<Amount, PaymentReceiptError> {
        if self.unreadable.lock().unwrap().iter().any(|id| id == payment_id) {
            return Err(PaymentReceiptError("wallet RPC timed out".to_string()));
        }
        Ok(self.received.lock().unwrap().get(payment_id).copied().unwrap_or(Amount::ZERO))
    }
}
