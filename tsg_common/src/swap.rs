use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{sqlite_text, Amount, Currency};

/// The canonical progress of a swap, independent of which provider runs it.
///
/// | Swap status                          | Order state |
/// |--------------------------------------|-------------|
/// | `Waiting`, `Confirming`, `Exchanging` | SwapPending |
/// | `Complete`                           | Paid        |
/// | `Failed`, `Expired`                  | Cancelled   |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    Waiting,
    Confirming,
    Exchanging,
    Complete,
    Failed,
    Expired,
}

sqlite_text!(SwapStatus);

impl SwapStatus {
    /// True once the provider will never report a different status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapStatus::Complete | SwapStatus::Failed | SwapStatus::Expired)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SwapStatus::Failed | SwapStatus::Expired)
    }
}

impl Display for SwapStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SwapStatus::Waiting => "waiting",
            SwapStatus::Confirming => "confirming",
            SwapStatus::Exchanging => "exchanging",
            SwapStatus::Complete => "complete",
            SwapStatus::Failed => "failed",
            SwapStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

impl FromStr for SwapStatus {
    type Err = String;

    /// Parses the canonical names only. Provider vocabularies are mapped by the provider adapters.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "waiting" => Ok(SwapStatus::Waiting),
            "confirming" => Ok(SwapStatus::Confirming),
            "exchanging" => Ok(SwapStatus::Exchanging),
            "complete" => Ok(SwapStatus::Complete),
            "failed" => Ok(SwapStatus::Failed),
            "expired" => Ok(SwapStatus::Expired),
            _ => Err(format!("Invalid swap status: {s}")),
        }
    }
}

/// A non-binding price for swapping `from_amount` of `from_currency` into the reference currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub from_amount: Amount,
    pub to_amount: Amount,
    /// Units of `to_currency` per unit of `from_currency`
    pub rate: Decimal,
    pub provider: String,
    pub quote_id: String,
    pub expires_at: DateTime<Utc>,
}

impl SwapQuote {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A swap that a provider has agreed to execute. The customer pays into `deposit_address`, and the provider sends
/// `expected_amount` of the reference currency to `destination_address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOrder {
    pub swap_id: String,
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub from_amount: Amount,
    pub deposit_address: String,
    pub expected_amount: Amount,
    pub destination_address: String,
    pub refund_address: Option<String>,
    pub provider: String,
    pub status: SwapStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SwapOrder {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
