//! Settlement server
//!
//! The server hosts the settlement engine's background processes. It wires the engine to its live collaborators
//! (CoinGecko for prices, the configured swap providers, and the platform's Monero wallet RPC) and runs the
//! [`workers::ReconciliationScheduler`], which keeps orders and commission invoices moving forward without any
//! request having to drive them.
//!
//! Every scheduler job can also be run once from the command line. See [`cli`].
pub mod cli;
pub mod config;
pub mod errors;
pub mod server;
pub mod services;
pub mod workers;
