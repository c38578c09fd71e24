//! Run report: the single structured result object returned by the pipeline
//!
//! Every row that did not result in a committed write is accounted for in
//! exactly one counter or list entry. Rendering is a caller concern.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Why a candidate was routed to the review list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ReviewReason {
    /// Identifier present but not normalizable
    MalformedIdentifier(String),
    /// No identifier at all and no exact name match
    NoUsableIdentifier,
    /// Valid identifier but no organization name to insert under
    MissingName,
    /// Candidate row could not be parsed from the source
    SourceError(String),
    /// Store lookup failed while matching this row
    LookupFailed(String),
}

impl std::fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewReason::MalformedIdentifier(raw) => {
                write!(f, "malformed identifier {:?}", raw)
            }
            ReviewReason::NoUsableIdentifier => {
                write!(f, "no usable identifier and no name match")
            }
            ReviewReason::MissingName => write!(f, "missing organization name"),
            ReviewReason::SourceError(e) => write!(f, "unreadable source row: {}", e),
            ReviewReason::LookupFailed(e) => write!(f, "store lookup failed: {}", e),
        }
    }
}

/// A candidate that requires manual or downstream resolution
#[derive(Debug, Clone, Serialize)]
pub struct ReviewEntry {
    pub source_row: usize,
    pub name: String,
    pub reason: ReviewReason,
}

/// A batch (or its remaining rows) that exhausted its retry budget
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub batch_index: u64,
    /// Identifiers of the rows that did not commit
    pub eins: Vec<String>,
    /// Source offsets for manual replay
    pub source_rows: Vec<usize>,
    /// Raw error from the last attempt
    pub error: String,
}

/// Final report for one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Name of the candidate source (file path for CSV sources)
    pub source: String,

    pub total_seen: u64,
    /// Rows whose identifier was present but malformed
    pub invalid_identifier: u64,
    /// Rows matched to an existing canonical record
    pub matched: u64,
    pub inserted: u64,
    pub updated: u64,
    /// Policy skips plus rows already applied per the checkpoint
    pub skipped_duplicate: u64,
    /// Rows that ended in the failure list
    pub failed: u64,

    pub batches_committed: u64,
    pub batches_failed: u64,

    pub review: Vec<ReviewEntry>,
    pub failures: Vec<BatchFailure>,

    /// True when the run stopped early on cancellation
    pub cancelled: bool,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    pub fn new(source: String) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source,
            total_seen: 0,
            invalid_identifier: 0,
            matched: 0,
            inserted: 0,
            updated: 0,
            skipped_duplicate: 0,
            failed: 0,
            batches_committed: 0,
            batches_failed: 0,
            review: Vec::new(),
            failures: Vec::new(),
            cancelled: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Rows routed to the review list
    pub fn review_count(&self) -> u64 {
        self.review.len() as u64
    }
}
