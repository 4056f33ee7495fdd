//! Errors returned by key-value store backends.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// [`StoreError::NotFound`] is the only variant callers are expected to
/// branch on. Everything else is an opaque backend failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether this error is the "key not found" sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Convenience alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;
