use std::{
    fmt::Display,
    iter::Sum,
    ops::Mul,
    str::FromStr,
};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{op, sqlite_text};

//--------------------------------------       Amount        ---------------------------------------------------------
/// A monetary amount in some currency. The currency is carried alongside the amount wherever it matters.
///
/// The value is an arbitrary-precision decimal, so `2.5 * 2` is exactly `5.0` and sums never drift.
/// Amounts are stored as TEXT in SQLite and must be summed in Rust rather than with SQL aggregates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

op!(binary Amount, Add, add);
op!(binary Amount, Sub, sub);
op!(inplace Amount, AddAssign, add_assign);
op!(inplace Amount, SubAssign, sub_assign);
op!(unary Amount, Neg, neg);

sqlite_text!(Amount);

#[derive(Debug, Clone, Error)]
#[error("Invalid amount: {0}")]
pub struct AmountParseError(String);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Truncates towards zero to at most `dp` decimal places. For positive amounts this is rounding down.
    pub fn round_down(&self, dp: u32) -> Self {
        Self(self.0.round_dp_with_strategy(dp, RoundingStrategy::ToZero).normalize_to(dp))
    }

    /// Rounds to the nearest value with `dp` decimal places, with midpoints rounded away from zero.
    pub fn round_nearest(&self, dp: u32) -> Self {
        Self(self.0.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero).normalize_to(dp))
    }

    /// Builds an amount from an integer count of atomic units, e.g. piconero with `decimals = 12`.
    pub fn from_atomic_units(units: u64, decimals: u32) -> Self {
        Self(Decimal::from_i128_with_scale(i128::from(units), decimals).normalize())
    }

    /// Returns `self / rhs`, or `None` if `rhs` is zero or the result overflows.
    pub fn checked_div(&self, rhs: Decimal) -> Option<Self> {
        self.0.checked_div(rhs).map(Self)
    }

    pub fn checked_mul(&self, rhs: Decimal) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    /// The number of decimal places used by the current representation.
    pub fn scale(&self) -> u32 {
        self.0.scale()
    }
}

trait NormalizeTo {
    fn normalize_to(self, dp: u32) -> Self;
}

impl NormalizeTo for Decimal {
    /// Drops trailing zeroes, but never below one decimal place, so that `5` prints as `5.0`.
    fn normalize_to(self, dp: u32) -> Self {
        let mut result = self.normalize();
        if result.scale() == 0 && dp > 0 {
            result.rescale(1);
        }
        result
    }
}

impl Mul<Decimal> for Amount {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Mul<i64> for Amount {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * Decimal::from(rhs))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), std::ops::Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl FromStr for Amount {
    type Err = AmountParseError;

    /// Accepts plain decimal notation as well as scientific notation (`1.5e-3`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Decimal::from_str_exact(s)
            .or_else(|_| Decimal::from_scientific(s))
            .map(Self)
            .map_err(|e| AmountParseError(format!("{s}. {e}")))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn arithmetic_is_exact() {
        let price = Amount::from(dec!(2.5));
        let total = price * 2;
        assert_eq!(total, Amount::from(dec!(5.0)));
        assert_eq!(total.to_string(), "5.0");
        let commission = total * dec!(0.05);
        assert_eq!(commission, Amount::from(dec!(0.25)));
        let sum: Amount = [dec!(0.1), dec!(0.2)].into_iter().map(Amount::from).sum();
        assert_eq!(sum, Amount::from(dec!(0.3)));
    }

    #[test]
    fn rounding() {
        let a = Amount::from(dec!(0.123456789999));
        assert_eq!(a.round_down(8), Amount::from(dec!(0.12345678)));
        assert_eq!(a.round_down(6), Amount::from(dec!(0.123456)));
        assert_eq!(Amount::from(dec!(10.005)).round_nearest(2), Amount::from(dec!(10.01)));
        assert_eq!(Amount::from(dec!(10.004)).round_nearest(2), Amount::from(dec!(10.00)));
        assert_eq!(Amount::from(dec!(3)).round_down(8).to_string(), "3.0");
    }

    #[test]
    fn atomic_units() {
        let a = Amount::from_atomic_units(2_500_000_000_000, 12);
        assert_eq!(a, Amount::from(dec!(2.5)));
        let a = Amount::from_atomic_units(1, 12);
        assert_eq!(a.to_string(), "0.000000000001");
    }

    #[test]
    fn parsing() {
        assert_eq!("150.25".parse::<Amount>().unwrap(), Amount::from(dec!(150.25)));
        assert_eq!("1.5e-3".parse::<Amount>().unwrap(), Amount::from(dec!(0.0015)));
        assert!("abc".parse::<Amount>().is_err());
        assert!(Amount::from(dec!(0.0001)).is_positive());
        assert!(!Amount::ZERO.is_positive());
        assert!(!Amount::from(dec!(-1)).is_positive());
    }
}
