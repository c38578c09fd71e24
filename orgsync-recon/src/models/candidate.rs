//! Candidate records from external sources
//!
//! A `CandidateRecord` is the raw, unvalidated shape a source hands to the
//! pipeline; a `NormalizedCandidate` is the same row after identifier and
//! field normalization. Both are ephemeral and never persisted as-is.

use crate::models::ContactInfo;

/// One raw row from an external source (tax-filing extract, spreadsheet
/// export, scraped directory)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateRecord {
    /// 0-based offset of the row in its source
    pub source_row: usize,

    /// Raw identifier; may contain separators, be malformed, or be absent
    pub ein: Option<String>,

    /// Organization name
    pub name: String,

    /// Raw website string
    pub website: Option<String>,

    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub phone: Option<String>,

    /// Annual revenue in whole dollars
    pub annual_revenue: Option<i64>,

    /// Explicit classification from the source; `None` = unknown
    pub public_facing: Option<bool>,

    pub tax_status: Option<String>,
    pub organization_type: Option<String>,
}

/// A candidate after identifier and field normalization
#[derive(Debug, Clone, Default)]
pub struct NormalizedCandidate {
    pub source_row: usize,

    /// Canonical 9-digit identifier, when the raw value normalized
    pub ein: Option<String>,

    /// True when a raw identifier was present but failed normalization.
    /// Distinguishes "malformed" (routed to review) from "absent"
    /// (eligible for name matching).
    pub ein_was_malformed: bool,

    pub name: String,

    /// Normalized absolute URL, never an empty string
    pub website: Option<String>,

    pub contact: ContactInfo,

    pub annual_revenue: Option<i64>,

    /// Explicit classification only; the heuristic fills this in later
    /// when neither the candidate nor the canonical record carries one
    pub public_facing: Option<bool>,

    pub tax_status: Option<String>,
    pub organization_type: Option<String>,
}

impl NormalizedCandidate {
    /// Whether this candidate can be inserted as a new canonical record
    pub fn insertable(&self) -> bool {
        self.ein.is_some() && !self.name.trim().is_empty()
    }
}
