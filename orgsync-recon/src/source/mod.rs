//! Candidate sources
//!
//! The engine consumes an already-extracted sequence of raw field tuples;
//! acquisition (downloads, scraping) happens elsewhere. A source must be
//! restartable: every `candidates()` call yields the sequence from the
//! beginning, which is what makes checkpointed re-runs possible.

mod csv;

pub use self::csv::CsvSource;

use crate::error::ReconResult;
use crate::models::CandidateRecord;

/// A restartable sequence of candidate records
pub trait CandidateSource {
    /// Human-readable origin (file path for file-backed sources)
    fn name(&self) -> &str;

    /// Iterate the sequence from the beginning
    fn candidates(
        &self,
    ) -> ReconResult<Box<dyn Iterator<Item = ReconResult<CandidateRecord>> + '_>>;
}

/// In-memory source for callers that extracted their own rows (and for tests)
pub struct VecSource {
    name: String,
    rows: Vec<CandidateRecord>,
}

impl VecSource {
    pub fn new(name: impl Into<String>, rows: Vec<CandidateRecord>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

impl CandidateSource for VecSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn candidates(
        &self,
    ) -> ReconResult<Box<dyn Iterator<Item = ReconResult<CandidateRecord>> + '_>> {
        Ok(Box::new(self.rows.iter().cloned().map(Ok)))
    }
}
