//! # Currency conversion
//!
//! [`CurrencyConverter`] converts amounts between the supported crypto and fiat currencies. It has two modes, and they
//! must not be confused:
//!
//! * **Live mode** ([`CurrencyConverter::convert`]) fetches fresh prices on every call. Every order-affecting
//!   conversion uses this mode. If the rate source fails, times out, or omits any required pair, the conversion fails
//!   with [`ConversionError::RateUnavailable`].
//! * **Cached mode** ([`CurrencyConverter::convert_cached`]) uses the last table stored in the [`DisplayRateCache`], if
//!   it is younger than the cache's freshness window. It never fetches. It is only for non-binding price previews.
//!
//! ## Rounding
//!
//! | from   | to     | method                                           | rounding                   |
//! |--------|--------|--------------------------------------------------|----------------------------|
//! | x      | x      | passthrough                                      | down, to target precision  |
//! | fiat   | crypto | `amount / price(crypto, fiat)`                   | down, to target precision  |
//! | crypto | fiat   | `amount * price(crypto, fiat)`                   | nearest cent, ties away    |
//! | crypto | crypto | cross rate through USD                           | down, to target precision  |
//! | fiat   | fiat   | cross rate through the reference currency        | nearest cent, ties away    |
//!
//! Rounding down always favours the platform, so the amount a customer is asked to pay is never short.
use std::{
    fmt::Debug,
    sync::{Arc, RwLock},
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::*;
use tsg_common::{Amount, Currency, RateTable};

use crate::{settlement_api::errors::ConversionError, traits::ExchangeRates};

pub const DISPLAY_CACHE_FRESHNESS: Duration = Duration::from_secs(5 * 60);

const FIAT_PRECISION: u32 = 2;

/// Converts `amount` from one currency to another using the prices in `table`.
pub fn convert_with_table(
    amount: Amount,
    from: Currency,
    to: Currency,
    table: &RateTable,
) -> Result<Amount, ConversionError> {
    if !amount.is_positive() {
        return Err(ConversionError::NonPositiveAmount(amount));
    }
    let price = |crypto: Currency, fiat: Currency| {
        table.price(crypto, fiat).ok_or_else(|| ConversionError::RateUnavailable(format!("No rate for {crypto}/{fiat}")))
    };
    let value = amount.value();
    let result = match (from.is_fiat(), to.is_fiat()) {
        _ if from == to => return Ok(amount.round_down(to.precision())),
        (true, false) => {
            let p = price(to, from)?;
            Amount::from(value.checked_div(p).ok_or(ConversionError::Overflow)?).round_down(to.precision())
        },
        (false, true) => {
            let p = price(from, to)?;
            Amount::from(value.checked_mul(p).ok_or(ConversionError::Overflow)?).round_nearest(FIAT_PRECISION)
        },
        (false, false) => {
            let usd_from = price(from, Currency::Usd)?;
            let usd_to = price(to, Currency::Usd)?;
            let usd = value.checked_mul(usd_from).ok_or(ConversionError::Overflow)?;
            Amount::from(usd.checked_div(usd_to).ok_or(ConversionError::Overflow)?).round_down(to.precision())
        },
        (true, true) => {
            let ref_from = price(Currency::REFERENCE, from)?;
            let ref_to = price(Currency::REFERENCE, to)?;
            let in_reference = value.checked_div(ref_from).ok_or(ConversionError::Overflow)?;
            Amount::from(in_reference.checked_mul(ref_to).ok_or(ConversionError::Overflow)?)
                .round_nearest(FIAT_PRECISION)
        },
    };
    Ok(result)
}

/// The currency pairs a live conversion between `from` and `to` depends on. The reference currency and USD are
/// always included, so that a partial response from the rate source is caught even for direct pairs.
fn required_pairs(from: Currency, to: Currency) -> (Vec<Currency>, Vec<Currency>) {
    let mut cryptos = vec![Currency::REFERENCE];
    let mut fiats = vec![Currency::Usd];
    for c in [from, to] {
        let list = if c.is_fiat() { &mut fiats } else { &mut cryptos };
        if !list.contains(&c) {
            list.push(c);
        }
    }
    (cryptos, fiats)
}

/// An explicitly owned cache of display rates. Clones share the same underlying table.
#[derive(Clone)]
pub struct DisplayRateCache {
    table: Arc<RwLock<Option<RateTable>>>,
    freshness: Duration,
}

impl Debug for DisplayRateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DisplayRateCache (freshness {}s)", self.freshness.as_secs())
    }
}

impl Default for DisplayRateCache {
    fn default() -> Self {
        Self::new(DISPLAY_CACHE_FRESHNESS)
    }
}

impl DisplayRateCache {
    pub fn new(freshness: Duration) -> Self {
        Self { table: Arc::new(RwLock::new(None)), freshness }
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    pub fn store(&self, table: RateTable) {
        let mut guard = self.table.write().unwrap_or_else(|p| p.into_inner());
        *guard = Some(table);
    }

    /// The cached table, if there is one and it is younger than the freshness window at `now`.
    pub fn fresh_table(&self, now: DateTime<Utc>) -> Option<RateTable> {
        let guard = self.table.read().unwrap_or_else(|p| p.into_inner());
        let table = guard.as_ref()?;
        let age = table.age(now).to_std().unwrap_or_default();
        (age < self.freshness).then(|| table.clone())
    }

    pub fn clear(&self) {
        let mut guard = self.table.write().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }
}

pub struct CurrencyConverter<R> {
    rates: R,
    cache: DisplayRateCache,
}

impl<R> Debug for CurrencyConverter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CurrencyConverter ({:?})", self.cache)
    }
}

impl<R> CurrencyConverter<R>
where R: ExchangeRates
{
    pub fn new(rates: R) -> Self {
        Self::with_cache(rates, DisplayRateCache::default())
    }

    pub fn with_cache(rates: R, cache: DisplayRateCache) -> Self {
        Self { rates, cache }
    }

    pub fn cache(&self) -> &DisplayRateCache {
        &self.cache
    }

    /// Live conversion between two currency codes. Codes are case-insensitive.
    pub async fn convert(&self, amount: Amount, from: &str, to: &str) -> Result<Amount, ConversionError> {
        let from = from.parse::<Currency>()?;
        let to = to.parse::<Currency>()?;
        self.convert_currency(amount, from, to).await
    }

    /// Live conversion. Fetches a fresh rate table for the pairs involved.
    pub async fn convert_currency(&self, amount: Amount, from: Currency, to: Currency) -> Result<Amount, ConversionError> {
        if !amount.is_positive() {
            return Err(ConversionError::NonPositiveAmount(amount));
        }
        if from == to {
            return Ok(amount.round_down(to.precision()));
        }
        let (cryptos, fiats) = required_pairs(from, to);
        let table = self.rates.fetch_rates(&cryptos, &fiats).await?;
        let missing = table.missing_pairs(&cryptos, &fiats);
        if !missing.is_empty() {
            warn!("💱️ Rate table is missing {}. Refusing to convert", missing.join(", "));
            return Err(ConversionError::RateUnavailable(format!("Missing rates: {}", missing.join(", "))));
        }
        let result = convert_with_table(amount, from, to, &table)?;
        debug!("💱️ {amount} {from} = {result} {to}");
        Ok(result)
    }

    /// Fetches prices for every supported crypto and fiat currency, and stores them in the display cache.
    pub async fn refresh_display_rates(&self) -> Result<(), ConversionError> {
        let table = self.rates.fetch_rates(&Currency::CRYPTO, &Currency::FIAT).await?;
        let missing = table.missing_pairs(&Currency::CRYPTO, &Currency::FIAT);
        if !missing.is_empty() {
            return Err(ConversionError::RateUnavailable(format!("Missing rates: {}", missing.join(", "))));
        }
        debug!("💱️ Display rates refreshed ({} pairs)", table.len());
        self.cache.store(table);
        Ok(())
    }

    /// Non-binding conversion from the display cache. Returns `Ok(None)` when there is no fresh rate for the pair.
    pub fn convert_cached(&self, amount: Amount, from: &str, to: &str) -> Result<Option<Amount>, ConversionError> {
        let from = from.parse::<Currency>()?;
        let to = to.parse::<Currency>()?;
        self.convert_cached_currency(amount, from, to, Utc::now())
    }

    pub fn convert_cached_currency(
        &self,
        amount: Amount,
        from: Currency,
        to: Currency,
        now: DateTime<Utc>,
    ) -> Result<Option<Amount>, ConversionError> {
        if !amount.is_positive() {
            return Err(ConversionError::NonPositiveAmount(amount));
        }
        if from == to {
            return Ok(Some(amount.round_down(to.precision())));
        }
        let Some(table) = self.cache.fresh_table(now) else {
            trace!("💱️ No fresh display rates");
            return Ok(None);
        };
        match convert_with_table(amount, from, to, &table) {
            Ok(v) => Ok(Some(v)),
            Err(ConversionError::RateUnavailable(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
