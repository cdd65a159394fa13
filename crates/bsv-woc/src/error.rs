//! Error types for WhatsOnChain operations.

use bsv_primitives::PrimitivesError;
use bsv_spv::ProviderError;
use bsv_transaction::TransactionError;

/// Errors that can occur when interacting with the WhatsOnChain API.
#[derive(Debug, thiserror::Error)]
pub enum WocError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to serialize or deserialize data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Server returned a non-2xx response other than 404 or 429.
    #[error("server error ({status_code}): {message}")]
    ServerError {
        /// HTTP status code.
        status_code: u16,
        /// Error message from server.
        message: String,
    },

    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Still receiving 429 after every retry.
    #[error("rate limited after {attempts} attempts")]
    RateLimited {
        /// Requests sent, including the first.
        attempts: u32,
    },

    /// The response parsed but does not describe what was asked for.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A raw transaction failed to decode.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// A hash or hex field failed to decode.
    #[error(transparent)]
    Primitives(#[from] PrimitivesError),
}

impl From<WocError> for ProviderError {
    fn from(e: WocError) -> Self {
        match e {
            WocError::NotFound(what) => ProviderError::NotFound(what),
            WocError::RateLimited { .. } => ProviderError::RateLimited(e.to_string()),
            WocError::ServerError {
                status_code,
                message,
            } if (400..500).contains(&status_code) => ProviderError::Client {
                status: status_code,
                message,
            },
            WocError::ServerError {
                status_code,
                message,
            } => ProviderError::Server {
                status: status_code,
                message,
            },
            WocError::HttpError(e) => ProviderError::Transport(e.to_string()),
            other => ProviderError::Decode(other.to_string()),
        }
    }
}
