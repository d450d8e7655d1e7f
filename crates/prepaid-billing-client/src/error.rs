//! Client error types.

/// Errors that can occur when using the prepaid-billing client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// The balance could not cover the operation.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Balance the server checked against.
        balance: u64,
        /// Amount that was needed.
        required: u64,
    },

    /// No period was owed or affordable.
    #[error("nothing to charge")]
    NothingToCharge,

    /// No revenue has been collected.
    #[error("nothing to withdraw")]
    NothingToWithdraw,

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
