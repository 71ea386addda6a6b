//! Error types for reconciliation operations.

use thiserror::Error;

/// Errors raised while projecting or diffing configuration attributes.
#[derive(Debug, Error)]
pub enum Error {
    /// A required remote attribute was absent and the mapping entry
    /// declares no default for it.
    #[error("required remote attribute '{attr}' is missing")]
    MissingAttr {
        /// Remote attribute name that could not be resolved
        attr: String,
    },

    /// The local configuration declares an implementation type the remote
    /// schema catalog does not expose.
    #[error("unsupported implementation '{implementation}' (remote offers: {})", available.join(", "))]
    UnsupportedImplementation {
        /// Implementation name requested by the local configuration
        implementation: String,
        /// Implementation names the remote catalog actually offers
        available: Vec<String>,
    },

    /// A value failed to encode or decode through a mapping entry codec.
    #[error("invalid value for '{attr}': {message}")]
    InvalidValue {
        /// Local or remote attribute name the value belongs to
        attr: String,
        /// Description of what made the value unusable
        message: String,
    },

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;
