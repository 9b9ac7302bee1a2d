use exchange_tools::ExchangeApiError;
use settlement_engine::{CommissionError, OrderFlowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not create an external API client. {0}")]
    ExchangeApiError(#[from] ExchangeApiError),
    #[error("Order processing failed. {0}")]
    OrderFlowError(#[from] OrderFlowError),
    #[error("Commission processing failed. {0}")]
    CommissionError(#[from] CommissionError),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
}
