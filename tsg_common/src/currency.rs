use std::{fmt::Display, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{sqlite_text, Amount};

/// All tenant settlement happens in this currency.
pub const REFERENCE_CURRENCY_CODE: &str = "XMR";
pub const REFERENCE_CURRENCY_CODE_LOWER: &str = "xmr";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported currency: {0}")]
pub struct UnsupportedCurrency(pub String);

/// The currencies the gateway knows about. Crypto currencies are accepted as payment; fiat currencies are only
/// used for pricing previews and rate lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Xmr,
    Btc,
    Eth,
    Sol,
    Ltc,
    Usdt,
    Usdc,
    Usd,
    Gbp,
    Eur,
}

sqlite_text!(Currency);

impl Currency {
    pub const REFERENCE: Currency = Currency::Xmr;
    pub const CRYPTO: [Currency; 7] =
        [Currency::Xmr, Currency::Btc, Currency::Eth, Currency::Sol, Currency::Ltc, Currency::Usdt, Currency::Usdc];
    pub const FIAT: [Currency; 3] = [Currency::Usd, Currency::Gbp, Currency::Eur];

    /// The upper-case currency code, e.g. `BTC`.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Xmr => "XMR",
            Currency::Btc => "BTC",
            Currency::Eth => "ETH",
            Currency::Sol => "SOL",
            Currency::Ltc => "LTC",
            Currency::Usdt => "USDT",
            Currency::Usdc => "USDC",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Eur => "EUR",
        }
    }

    /// The lower-case ticker that exchange APIs expect, e.g. `btc`.
    pub fn ticker(&self) -> String {
        self.code().to_ascii_lowercase()
    }

    pub fn is_fiat(&self) -> bool {
        Self::FIAT.contains(self)
    }

    pub fn is_crypto(&self) -> bool {
        !self.is_fiat()
    }

    pub fn is_reference(&self) -> bool {
        *self == Self::REFERENCE
    }

    /// Native precision, in decimal places, that amounts in this currency are rounded to.
    pub fn precision(&self) -> u32 {
        match self {
            Currency::Xmr | Currency::Btc | Currency::Sol | Currency::Ltc => 8,
            Currency::Eth | Currency::Usdt | Currency::Usdc => 6,
            Currency::Usd | Currency::Gbp | Currency::Eur => 2,
        }
    }

    /// The smallest amount of this coin that the exchange providers accept for a swap. `None` for fiat.
    pub fn min_swap_amount(&self) -> Option<Amount> {
        let (mantissa, scale) = match self {
            Currency::Xmr => (1, 3),
            Currency::Btc => (1, 4),
            Currency::Eth => (1, 2),
            Currency::Sol => (1, 1),
            Currency::Ltc => (1, 2),
            Currency::Usdt | Currency::Usdc => (10, 0),
            Currency::Usd | Currency::Gbp | Currency::Eur => return None,
        };
        Some(Amount::from(Decimal::new(mantissa, scale)))
    }

    /// Parses a payment currency. Fiat codes are rejected, since customers can only pay in crypto.
    pub fn parse_payment_currency(code: &str) -> Result<Self, UnsupportedCurrency> {
        match code.parse::<Currency>()? {
            c if c.is_crypto() => Ok(c),
            _ => Err(UnsupportedCurrency(code.to_string())),
        }
    }
}

impl FromStr for Currency {
    type Err = UnsupportedCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "XMR" => Ok(Currency::Xmr),
            "BTC" => Ok(Currency::Btc),
            "ETH" => Ok(Currency::Eth),
            "SOL" => Ok(Currency::Sol),
            "LTC" => Ok(Currency::Ltc),
            "USDT" => Ok(Currency::Usdt),
            "USDC" => Ok(Currency::Usdc),
            "USD" => Ok(Currency::Usd),
            "GBP" => Ok(Currency::Gbp),
            "EUR" => Ok(Currency::Eur),
            _ => Err(UnsupportedCurrency(s.to_string())),
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn parse_codes() {
        assert_eq!("btc".parse::<Currency>().unwrap(), Currency::Btc);
        assert_eq!(" Usdc ".parse::<Currency>().unwrap(), Currency::Usdc);
        assert_eq!("gbp".parse::<Currency>().unwrap(), Currency::Gbp);
        assert_eq!("doge".parse::<Currency>(), Err(UnsupportedCurrency("doge".into())));
        assert!(Currency::parse_payment_currency("usd").is_err());
        assert_eq!(Currency::parse_payment_currency("XMR").unwrap(), Currency::REFERENCE);
    }

    #[test]
    fn precision_and_minimums() {
        assert_eq!(Currency::Xmr.precision(), 8);
        assert_eq!(Currency::Btc.precision(), 8);
        assert_eq!(Currency::Eth.precision(), 6);
        assert_eq!(Currency::Eur.precision(), 2);
        assert_eq!(Currency::Btc.min_swap_amount(), Some(Amount::from(dec!(0.0001))));
        assert_eq!(Currency::Usdt.min_swap_amount(), Some(Amount::from(dec!(10))));
        assert_eq!(Currency::Usd.min_swap_amount(), None);
    }

    #[test]
    fn display_and_serde() {
        assert_eq!(Currency::Usdt.to_string(), "USDT");
        assert_eq!(Currency::Usdt.ticker(), "usdt");
        assert_eq!(serde_json::to_string(&Currency::Ltc).unwrap(), "\"ltc\"");
        assert!(Currency::Xmr.is_reference());
        assert!(Currency::Gbp.is_fiat());
    }
}
