//! Registry store abstraction
//!
//! The canonical registry is reachable through this trait: point lookups for
//! the matcher, and a bulk-write operation that maps the run's conflict
//! policy onto whatever native conflict handling the backend offers. Two
//! backends are provided: SQLite (transactional batches) and a
//! PostgREST-style HTTP data API (row-level, partial success possible).

pub mod rest;
pub mod sqlite;

pub use rest::PostgrestStore;
pub use sqlite::SqliteStore;

use crate::error::ReconResult;
use crate::models::CanonicalRecord;
use crate::resolver::{ConflictPolicy, WriteOp};
use async_trait::async_trait;

/// One row that did not commit in an otherwise-applied batch
#[derive(Debug, Clone)]
pub struct RowFailure {
    pub source_row: usize,
    pub ein: String,
    pub error: String,
}

/// Per-batch apply result
///
/// `failed_rows` is non-empty only for row-level backends; transactional
/// backends either commit everything or return an error.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed_rows: Vec<RowFailure>,
}

/// Keyed access to the canonical registry
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Cheap reachability probe, run once before any batch is attempted
    async fn ping(&self) -> ReconResult<()>;

    /// Point lookup by canonical 9-digit identifier
    async fn find_by_ein(&self, ein: &str) -> ReconResult<Option<CanonicalRecord>>;

    /// Exact, case-insensitive full-name lookup
    async fn find_by_name(&self, name: &str) -> ReconResult<Option<CanonicalRecord>>;

    /// Apply a batch of write operations under the given conflict policy
    async fn apply_batch(
        &self,
        ops: &[WriteOp],
        policy: ConflictPolicy,
    ) -> ReconResult<BatchOutcome>;
}
