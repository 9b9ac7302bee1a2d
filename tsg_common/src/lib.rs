//! Value types shared by every crate in the settlement gateway workspace.
//!
//! Money is always carried as a decimal [`Amount`]. Binary floating point never appears in a monetary calculation.
mod amount;
mod currency;
mod helpers;
pub mod op;
mod rates;
mod secret;
mod swap;

pub use amount::{Amount, AmountParseError};
pub use currency::{Currency, UnsupportedCurrency, REFERENCE_CURRENCY_CODE, REFERENCE_CURRENCY_CODE_LOWER};
pub use helpers::parse_boolean_flag;
pub use rates::RateTable;
pub use secret::Secret;
pub use swap::{SwapOrder, SwapQuote, SwapStatus};
