//! # Storage and collaborator interfaces
//!
//! This module defines the interface contracts of the settlement engine's *backends*: the persistent store, and the
//! external services the engine consumes.
//!
//! ## Storage
//! * [`TenantManagement`] covers tenants and their products. Most of it is administrative CRUD.
//! * [`SettlementDatabase`] is the order store. It provides the one operation that really matters for correctness:
//!   [`SettlementDatabase::insert_order_with_reservation`], which decrements inventory and inserts the order in a
//!   single atomic transaction. Every order state change is a conditional update, so concurrent callers racing on the
//!   same order see exactly one winner.
//! * [`CommissionManagement`] stores commission invoices and applies enforcement actions against tenants.
//!
//! Every significant state change writes an entry to the append-only audit log in the same transaction.
//!
//! ## Collaborators
//! * [`ExchangeRates`] fetches a complete table of fiat prices for a set of crypto currencies.
//! * [`SwapExchange`] quotes, creates and tracks swaps into the reference currency.
//! * [`PaymentReceipts`] reports how much has been received against an invoice's payment id.
mod commission_management;
mod exchange_rates;
mod payment_receipts;
mod settlement_database;
mod swap_exchange;
mod tenant_management;

pub use commission_management::CommissionManagement;
pub use exchange_rates::{ExchangeRateError, ExchangeRates};
pub use payment_receipts::{PaymentReceiptError, PaymentReceipts};
pub use settlement_database::{SettlementDatabase, StoreError};
pub use swap_exchange::SwapExchange;
pub use tenant_management::TenantManagement;
