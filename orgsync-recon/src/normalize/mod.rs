//! Identifier and field normalization
//!
//! Pure functions; a malformed field never aborts a row, it just normalizes
//! to absent.

mod address;
mod ein;
mod website;

pub use address::{base_zip, comparison_key, same_address};
pub use ein::normalize_ein;
pub use website::normalize_website;

use crate::models::{CandidateRecord, ContactInfo, NormalizedCandidate};

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Normalize a raw candidate's identifier and fields
///
/// An empty or missing identifier is "absent" (eligible for name matching);
/// a non-empty identifier that fails normalization is "malformed" (the row
/// is routed to review).
pub fn normalize_candidate(raw: &CandidateRecord) -> NormalizedCandidate {
    let raw_ein = raw.ein.as_deref().map(str::trim).unwrap_or("");
    let (ein, ein_was_malformed) = if raw_ein.is_empty() {
        (None, false)
    } else {
        match normalize_ein(raw_ein) {
            Some(ein) => (Some(ein), false),
            None => (None, true),
        }
    };

    let website = raw.website.as_deref().and_then(normalize_website);

    let contact = ContactInfo {
        address: clean(&raw.street),
        city: clean(&raw.city),
        state: clean(&raw.state),
        zip: clean(&raw.postal_code),
        phone: clean(&raw.phone),
    };

    // Negative revenue is corrupted data, not a real figure
    let annual_revenue = raw.annual_revenue.filter(|r| *r >= 0);

    NormalizedCandidate {
        source_row: raw.source_row,
        ein,
        ein_was_malformed,
        name: raw.name.trim().to_string(),
        website,
        contact,
        annual_revenue,
        public_facing: raw.public_facing,
        tax_status: clean(&raw.tax_status),
        organization_type: clean(&raw.organization_type),
    }
}
