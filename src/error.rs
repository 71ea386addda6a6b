//! Application error types.
//!
//! Validation problems in the local configuration fail fast, before any
//! remote call. Errors from the remote API propagate unmodified through
//! the reconciliation passes: no retry, no rollback, and sections already
//! applied stay applied.

use thiserror::Error;

/// Errors that can occur while syncing an instance.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote API returned a non-2xx response
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code of the response
        status: u16,
        /// Description of the failed request
        message: String,
    },

    /// The HTTP round-trip itself failed (connection, DNS, TLS, ...)
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote API answered 2xx with a body missing something the
    /// sync logic depends on (an id, an expected attribute)
    #[error("unexpected API response: {0}")]
    UnexpectedResponse(String),

    /// API key retrieval or validation failed
    #[error("{0}")]
    SecretsUnauthorized(String),

    /// The local configuration is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// Projection or diffing failed
    #[error(transparent)]
    Reconcile(#[from] reconcile::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status code, for API errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, Error>;
