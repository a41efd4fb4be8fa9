//! Error types for Roost
//!
//! Everything that can go wrong while talking to the durable store or
//! the volatile cache is folded into `StoreError`. Only the read paths
//! surface these to callers; the write path absorbs transient
//! conditions and reports a `WriteOutcome` instead.

use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum StoreError {
    /// Durable store error (retried on the write path)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Durable store did not answer within its deadline
    #[error("Store timeout")]
    Timeout,

    /// Cooperative deadline-exceeded signal from the host runtime
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for StoreError {
    fn from(err: config::ConfigError) -> Self {
        StoreError::Config(err.to_string())
    }
}

impl StoreError {
    /// Whether the durable-write retry loop should try again.
    ///
    /// Timeouts and deadline signals end the attempt with an
    /// unconfirmed outcome; plain store errors are retried while
    /// writes remain enabled.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::PoolTimedOut) => false,
            StoreError::Database(_) => true,
            StoreError::Timeout | StoreError::DeadlineExceeded => false,
            StoreError::Config(_) | StoreError::Internal(_) => false,
        }
    }
}

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;
