use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::Currency;

/// A snapshot of crypto prices in fiat, as returned by a market-data API.
///
/// Prices are keyed by `(crypto, fiat)` and give the fiat value of one whole unit of the crypto currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateTable {
    prices: HashMap<(Currency, Currency), Decimal>,
    fetched_at: DateTime<Utc>,
}

impl RateTable {
    pub fn new(fetched_at: DateTime<Utc>) -> Self {
        Self { prices: HashMap::new(), fetched_at }
    }

    pub fn with_price(mut self, crypto: Currency, fiat: Currency, price: Decimal) -> Self {
        self.set_price(crypto, fiat, price);
        self
    }

    pub fn set_price(&mut self, crypto: Currency, fiat: Currency, price: Decimal) {
        self.prices.insert((crypto, fiat), price);
    }

    /// The fiat price of one unit of `crypto`, if the table has a positive entry for the pair.
    pub fn price(&self, crypto: Currency, fiat: Currency) -> Option<Decimal> {
        self.prices.get(&(crypto, fiat)).copied().filter(|p| *p > Decimal::ZERO)
    }

    /// Returns the pairs (as `CRYPTO/FIAT` strings) that are missing or non-positive. An empty result means the table
    /// is complete for the given currency sets.
    pub fn missing_pairs(&self, cryptos: &[Currency], fiats: &[Currency]) -> Vec<String> {
        cryptos
            .iter()
            .flat_map(|c| fiats.iter().map(move |f| (*c, *f)))
            .filter(|(c, f)| self.price(*c, *f).is_none())
            .map(|(c, f)| format!("{c}/{f}"))
            .collect()
    }

    pub fn is_complete(&self, cryptos: &[Currency], fiats: &[Currency]) -> bool {
        self.missing_pairs(cryptos, fiats).is_empty()
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn missing_pairs_are_reported() {
        let table = RateTable::new(Utc::now())
            .with_price(Currency::Xmr, Currency::Usd, dec!(150))
            .with_price(Currency::Btc, Currency::Usd, dec!(0));
        assert_eq!(table.price(Currency::Xmr, Currency::Usd), Some(dec!(150)));
        assert_eq!(table.price(Currency::Btc, Currency::Usd), None);
        let missing = table.missing_pairs(&[Currency::Xmr, Currency::Btc], &[Currency::Usd, Currency::Eur]);
        assert_eq!(missing, vec!["XMR/EUR", "BTC/USD", "BTC/EUR"]);
        assert!(table.is_complete(&[Currency::Xmr], &[Currency::Usd]));
    }
}
