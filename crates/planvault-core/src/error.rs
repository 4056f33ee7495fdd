//! Error taxonomy for plan operations.

use planvault_store::StoreError;
use thiserror::Error;

/// Errors returned by the plan repository and service.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Malformed or missing input.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("plan {0} not found")]
    NotFound(String),

    #[error("plan {0} already exists")]
    AlreadyExists(String),

    /// The stored value under a key is not a valid plan document.
    #[error("stored plan {key} is corrupt")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize plan")]
    Serialization(#[source] serde_json::Error),

    /// Any store failure other than a missing key.
    #[error("store operation failed")]
    Store(#[source] StoreError),
}

impl PlanError {
    /// Classify a store error for `key`. Only the typed not-found sentinel
    /// is recognised; everything else is opaque.
    pub fn from_store(key: &str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound(key.to_owned()),
            other => Self::Store(other),
        }
    }
}
