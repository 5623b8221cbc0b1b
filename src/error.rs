//! Error types for the calculator core

use thiserror::Error;

/// Result type alias for calculator operations
pub type Result<T> = std::result::Result<T, CalcError>;

#[derive(Error, Debug)]
pub enum CalcError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Operation {operation} expects {expected} arguments, but {actual} were provided.")]
    ValidationError {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("{source}")]
    InvocationError {
        operation: String,
        #[source]
        source: OperationFailure,
    },

    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    #[error("Invalid number format: {0}")]
    InvalidInput(String),

    #[error("Malformed operation table: {0}")]
    RegistryError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CalcError {
    /// The underlying operation failure, if this error came out of an invocation.
    pub fn operation_failure(&self) -> Option<&OperationFailure> {
        match self {
            CalcError::InvocationError { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failure raised by the computation behind a descriptor.
#[derive(Error, Debug)]
pub enum OperationFailure {
    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("{0}")]
    Arguments(String),

    #[error(transparent)]
    PriceFetch(#[from] PriceFetchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceFetchErrorKind {
    RateLimitExceeded,
    Network,
    Timeout,
    MalformedResponse,
    Unexpected,
}

/// Terminal outcome of a failed price lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceFetchError {
    #[error("CoinGecko API rate limit exceeded for {asset_id}. Please wait a moment before trying again. The free API has usage limits - consider waiting 1-2 minutes between multiple requests.")]
    RateLimitExceeded { asset_id: String },

    #[error("Network error getting {asset_id} price after {attempts} attempts. Please check your internet connection. Last error: {message}")]
    Network {
        asset_id: String,
        attempts: u32,
        message: String,
    },

    #[error("Request timeout getting {asset_id} price after {attempts} attempts. The API might be slow or unavailable. Last error: {message}")]
    Timeout {
        asset_id: String,
        attempts: u32,
        message: String,
    },

    #[error("Invalid response format for {asset_id} price. The API response format may have changed. Details: {details}")]
    MalformedResponse { asset_id: String, details: String },

    #[error("Unexpected error getting {asset_id} price: {message}")]
    Unexpected { asset_id: String, message: String },
}

impl PriceFetchError {
    pub fn kind(&self) -> PriceFetchErrorKind {
        match self {
            PriceFetchError::RateLimitExceeded { .. } => PriceFetchErrorKind::RateLimitExceeded,
            PriceFetchError::Network { .. } => PriceFetchErrorKind::Network,
            PriceFetchError::Timeout { .. } => PriceFetchErrorKind::Timeout,
            PriceFetchError::MalformedResponse { .. } => PriceFetchErrorKind::MalformedResponse,
            PriceFetchError::Unexpected { .. } => PriceFetchErrorKind::Unexpected,
        }
    }

    /// Whether the client retried this kind before giving up.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            PriceFetchErrorKind::RateLimitExceeded
                | PriceFetchErrorKind::Network
                | PriceFetchErrorKind::Timeout
        )
    }

    pub fn asset_id(&self) -> &str {
        match self {
            PriceFetchError::RateLimitExceeded { asset_id }
            | PriceFetchError::Network { asset_id, .. }
            | PriceFetchError::Timeout { asset_id, .. }
            | PriceFetchError::MalformedResponse { asset_id, .. }
            | PriceFetchError::Unexpected { asset_id, .. } => asset_id,
        }
    }
}
