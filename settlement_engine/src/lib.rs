//! Tenant Settlement Engine
//!
//! The settlement engine is the core of a multi-tenant marketplace in which independent shop owners (tenants) sell
//! goods, customers pay in one of several crypto currencies, and tenants are always settled in the reference currency
//! (XMR). The platform earns a commission on every completed sale and invoices tenants for it weekly.
//!
//! The library is divided into these sections:
//! 1. Storage ([`traits`] and, with the `sqlite` feature, [`SqliteDatabase`]). The traits define the interface contract
//!    that backends must honour. Most importantly, inventory reservation and order creation are one atomic operation,
//!    and every order state transition is a conditional update.
//! 2. The public API:
//!    * [`CurrencyConverter`] converts between fiat and crypto with strict rounding rules, in live or cached mode.
//!    * [`SwapOrchestrator`] obtains quotes and swaps from the configured exchange providers, with fallback.
//!    * [`OrderFlowApi`] creates orders, reserves inventory and drives orders through their state machine.
//!    * [`CommissionApi`] generates commission invoices, tracks their payment and enforces payment discipline.
//!
//! The engine also emits [`events`] when orders are paid or annulled and when tenants are deactivated. Hooks can be
//! attached to these with [`events::EventHooks`].
pub mod db_types;
pub mod events;
pub mod helpers;
mod settlement_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use settlement_api::{
    commission_api::{
        enforcement_tier_for,
        weekly_period,
        CommissionApi,
        INVOICE_DUE_DAYS,
        SUSPENSION_DAYS,
        TERMINATION_DAYS,
    },
    commission_objects,
    conversion_api::{convert_with_table, CurrencyConverter, DisplayRateCache, DISPLAY_CACHE_FRESHNESS},
    errors::{CommissionError, ConversionError, ErrorKind, OrderFlowError, SwapError},
    order_flow_api::{OrderFlowApi, DEFAULT_UNPAID_ORDER_TIMEOUT_HOURS},
    order_objects,
    swap_api::{SwapOrchestrator, SwapProvider, DIRECT_PROVIDER, MOCK_PROVIDER},
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
