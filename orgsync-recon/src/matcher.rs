//! Candidate-to-canonical matching
//!
//! Fallback cascade, stop at first hit: exact identifier match, then — only
//! when the candidate has no usable identifier — exact case-insensitive
//! full-name match. No fuzzy or partial name matching; an ambiguous match is
//! worse than a missed one here.

use crate::error::ReconResult;
use crate::models::{CanonicalRecord, NormalizedCandidate};
use crate::store::RegistryStore;

/// How (or whether) a candidate resolved to a canonical record
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    ByIdentifier(CanonicalRecord),
    ByName(CanonicalRecord),
    Unmatched,
}

impl MatchOutcome {
    pub fn record(&self) -> Option<&CanonicalRecord> {
        match self {
            MatchOutcome::ByIdentifier(record) | MatchOutcome::ByName(record) => Some(record),
            MatchOutcome::Unmatched => None,
        }
    }
}

/// Resolves candidates against the canonical registry
pub struct Matcher<'a> {
    store: &'a dyn RegistryStore,
}

impl<'a> Matcher<'a> {
    pub fn new(store: &'a dyn RegistryStore) -> Self {
        Self { store }
    }

    /// Run the match cascade for one normalized candidate
    ///
    /// A candidate carrying a valid identifier never falls through to name
    /// matching; identifier beats name unconditionally.
    pub async fn resolve(&self, candidate: &NormalizedCandidate) -> ReconResult<MatchOutcome> {
        if let Some(ein) = &candidate.ein {
            if let Some(record) = self.store.find_by_ein(ein).await? {
                return Ok(MatchOutcome::ByIdentifier(record));
            }
            return Ok(MatchOutcome::Unmatched);
        }

        if !candidate.name.is_empty() {
            if let Some(record) = self.store.find_by_name(&candidate.name).await? {
                return Ok(MatchOutcome::ByName(record));
            }
        }

        Ok(MatchOutcome::Unmatched)
    }
}
