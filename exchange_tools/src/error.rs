use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ExchangeApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("The request timed out: {0}")]
    Timeout(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The provider rejected the request: {0}")]
    Rejected(String),
    #[error("The provider returned a malformed response: {0}")]
    MalformedResponse(String),
    #[error("The rate source did not return every requested pair. Missing: {}", .0.join(", "))]
    IncompleteRates(Vec<String>),
    #[error("Currency {0} is not supported by this API")]
    UnsupportedCurrency(String),
    #[error("Wallet RPC error {code}: {message}")]
    RpcError { code: i64, message: String },
}

impl ExchangeApiError {
    /// True for failures of the transport or the remote service, as opposed to a bad request on our side.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, ExchangeApiError::Initialization(_) | ExchangeApiError::UnsupportedCurrency(_))
    }
}
