//! Error types for the reconciliation engine
//!
//! The taxonomy separates per-row conditions (malformed identifier, malformed
//! field) from batch-level store failures (transport, rejected statement) and
//! fatal startup conditions (configuration). Batch-level failures are the only
//! retryable class.

use thiserror::Error;

/// Result type for reconciliation operations
pub type ReconResult<T> = std::result::Result<T, ReconError>;

/// Reconciliation engine errors
#[derive(Debug, Error)]
pub enum ReconError {
    /// Identifier present but not normalizable (non-numeric or too long)
    #[error("Malformed identifier: {0:?}")]
    MalformedIdentifier(String),

    /// Store unreachable or request failed in transit
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Store reached but the statement/request was rejected
    #[error("Store rejected request: {0}")]
    Rejected(String),

    /// Candidate source could not be read
    #[error("Source error: {0}")]
    Source(String),

    /// Invalid or missing configuration; aborts the run before any batch
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shared orgsync error (IO, config file, database plumbing)
    #[error("Common error: {0}")]
    Common(#[from] orgsync_common::Error),
}

impl ReconError {
    /// Whether a batch submission hitting this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconError::Transport(_)
                | ReconError::Rejected(_)
                | ReconError::Common(orgsync_common::Error::Database(_))
        )
    }
}

impl From<sqlx::Error> for ReconError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            // Statement-level rejections carry a database error payload
            sqlx::Error::Database(dbe) => ReconError::Rejected(dbe.to_string()),
            other => ReconError::Transport(other.to_string()),
        }
    }
}
