use thiserror::Error;
use tsg_common::{Amount, UnsupportedCurrency};

use crate::{
    db_types::{InvoiceStatus, OrderStatusType},
    helpers::CipherError,
    traits::{ExchangeRateError, StoreError},
};

/// The broad category of a failure, for callers that present errors to users or decide whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input. Surface it verbatim and never retry.
    Validation,
    /// A tenant, product, order or invoice does not exist.
    NotFound,
    /// An external service failed. The next reconciliation pass, or a fallback provider, will make progress.
    Unavailable,
    /// A concurrent change got there first, e.g. the last unit of stock was sold.
    Conflict,
    /// Anything else. These are bugs or infrastructure failures.
    Internal,
}

#[derive(Debug, Clone, Error)]
pub enum ConversionError {
    #[error("Amounts must be positive, but got {0}")]
    NonPositiveAmount(Amount),
    #[error("{0}")]
    UnsupportedCurrency(#[from] UnsupportedCurrency),
    #[error("Exchange rates are unavailable. {0}")]
    RateUnavailable(String),
    #[error("The conversion overflowed")]
    Overflow,
}

impl ConversionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversionError::NonPositiveAmount(_) | ConversionError::UnsupportedCurrency(_) => ErrorKind::Validation,
            ConversionError::RateUnavailable(_) => ErrorKind::Unavailable,
            ConversionError::Overflow => ErrorKind::Internal,
        }
    }
}

impl From<ExchangeRateError> for ConversionError {
    fn from(e: ExchangeRateError) -> Self {
        ConversionError::RateUnavailable(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum SwapError {
    #[error("Swaps from {0} are not supported")]
    UnsupportedCurrency(String),
    #[error("Swap amounts must be positive, but got {0}")]
    NonPositiveAmount(Amount),
    #[error("{amount} {currency} is below the minimum swap amount of {minimum}")]
    BelowMinimum { currency: String, amount: Amount, minimum: Amount },
    #[error("No swap provider could handle the request. {0}")]
    ProviderUnavailable(String),
}

impl SwapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SwapError::UnsupportedCurrency(_) | SwapError::NonPositiveAmount(_) | SwapError::BelowMinimum { .. } => {
                ErrorKind::Validation
            },
            SwapError::ProviderUnavailable(_) => ErrorKind::Unavailable,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("{0}")]
    UnsupportedCurrency(#[from] UnsupportedCurrency),
    #[error("Quantity must be a positive whole number, but got {0}")]
    InvalidQuantity(i64),
    #[error("Tenant {0} does not exist")]
    TenantNotFound(i64),
    #[error("Tenant {0} is not currently active")]
    TenantInactive(i64),
    #[error("Tenant {0} has not configured a settlement wallet")]
    TenantWalletMissing(i64),
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Product {0} is not available")]
    ProductInactive(i64),
    #[error("{quantity} units of product {product_id} cost more than can be represented")]
    TotalOverflow { product_id: i64, quantity: i64 },
    #[error("Insufficient inventory. Requested {requested}, but only {available} available")]
    InsufficientInventory { requested: i64, available: i64 },
    #[error("Insufficient inventory. Product {product_id} sold out before {requested} units could be reserved")]
    InventoryConflict { product_id: i64, requested: i64 },
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
    #[error("Order cannot move from {from} to {to}")]
    IllegalTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Exchange rates are unavailable. {0}")]
    RateUnavailable(String),
    #[error("{0}")]
    Swap(SwapError),
    #[error("Order {0} is missing its swap details")]
    SwapDetailsMissing(i64),
    #[error("Could not protect the delivery address. {0}")]
    EncryptionError(#[from] CipherError),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl OrderFlowError {
    pub fn kind(&self) -> ErrorKind {
        use OrderFlowError::*;
        match self {
            UnsupportedCurrency(_) | InvalidQuantity(_) | TenantInactive(_) | TenantWalletMissing(_) |
            ProductInactive(_) | TotalOverflow { .. } | InsufficientInventory { .. } | IllegalTransition { .. } => {
                ErrorKind::Validation
            },
            TenantNotFound(_) | ProductNotFound(_) | OrderNotFound(_) => ErrorKind::NotFound,
            RateUnavailable(_) => ErrorKind::Unavailable,
            Swap(e) => e.kind(),
            InventoryConflict { .. } => ErrorKind::Conflict,
            SwapDetailsMissing(_) | EncryptionError(_) | DatabaseError(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for OrderFlowError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::TenantNotFound(id) => OrderFlowError::TenantNotFound(id),
            StoreError::ProductNotFound(id) => OrderFlowError::ProductNotFound(id),
            StoreError::OrderNotFound(id) => OrderFlowError::OrderNotFound(id),
            StoreError::InventoryConflict { product_id, requested } => {
                OrderFlowError::InventoryConflict { product_id, requested }
            },
            e => OrderFlowError::DatabaseError(e.to_string()),
        }
    }
}

impl From<ConversionError> for OrderFlowError {
    fn from(e: ConversionError) -> Self {
        match e {
            ConversionError::UnsupportedCurrency(c) => OrderFlowError::UnsupportedCurrency(c),
            e => OrderFlowError::RateUnavailable(e.to_string()),
        }
    }
}

impl From<SwapError> for OrderFlowError {
    fn from(e: SwapError) -> Self {
        OrderFlowError::Swap(e)
    }
}

#[derive(Debug, Clone, Error)]
pub enum CommissionError {
    #[error("Commission invoice {0} does not exist")]
    InvoiceNotFound(i64),
    #[error("Commission invoice {id} is already {status}")]
    InvoiceClosed { id: i64, status: InvoiceStatus },
    #[error("Payment amounts must be positive, but got {0}")]
    NonPositiveAmount(Amount),
    #[error("The invoice period is empty or reversed")]
    InvalidPeriod,
    #[error("Tenant {tenant_id} already has an invoice covering part of this period")]
    OverlappingPeriod { tenant_id: i64 },
    #[error("The invoice was modified concurrently. Try again")]
    ConcurrentModification(i64),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl CommissionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommissionError::InvoiceClosed { .. } |
            CommissionError::NonPositiveAmount(_) |
            CommissionError::InvalidPeriod |
            CommissionError::OverlappingPeriod { .. } => ErrorKind::Validation,
            CommissionError::InvoiceNotFound(_) => ErrorKind::NotFound,
            CommissionError::ConcurrentModification(_) => ErrorKind::Conflict,
            CommissionError::DatabaseError(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for CommissionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvoiceNotFound(id) => CommissionError::InvoiceNotFound(id),
            StoreError::OverlappingInvoicePeriod { tenant_id } => CommissionError::OverlappingPeriod { tenant_id },
            e => CommissionError::DatabaseError(e.to_string()),
        }
    }
}
