//! Data model for the reconciliation engine

mod candidate;
mod canonical;
mod report;

pub use candidate::{CandidateRecord, NormalizedCandidate};
pub use canonical::{CanonicalRecord, ContactInfo, NewRecord};
pub use report::{BatchFailure, ReviewEntry, ReviewReason, RunReport};
