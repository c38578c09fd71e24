//! Conflict resolution
//!
//! Given a normalized candidate and (optionally) its matched canonical
//! record, decides the write: insert, scoped update, policy skip, or review.
//! Updates only ever touch fields in the run's allow-list, so one source's
//! partial data cannot destroy a field populated by another source.

use std::fmt;
use std::str::FromStr;

use crate::models::{
    CanonicalRecord, ContactInfo, NewRecord, NormalizedCandidate, ReviewReason,
};
use crate::normalize::same_address;

/// What happens when a write targets an identifier that may already exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Skip rows whose identifier already exists; never update
    InsertOnly,
    /// Update existing records, insert absent ones
    Merge,
    /// Insert; silently skip on conflict, never update
    IgnoreDuplicate,
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insert-only" => Ok(ConflictPolicy::InsertOnly),
            "merge" => Ok(ConflictPolicy::Merge),
            "ignore-duplicate" => Ok(ConflictPolicy::IgnoreDuplicate),
            other => Err(format!(
                "unknown conflict policy {:?} (expected insert-only, merge, or ignore-duplicate)",
                other
            )),
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictPolicy::InsertOnly => "insert-only",
            ConflictPolicy::Merge => "merge",
            ConflictPolicy::IgnoreDuplicate => "ignore-duplicate",
        };
        f.write_str(s)
    }
}

/// Allow-list of fields an update pass may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope {
    /// All mutable fields
    Full,
    /// Contact sub-record only (address-fix passes)
    Addresses,
    /// `public_facing` and `website` only (classification passes)
    Classification,
}

impl FromStr for FieldScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(FieldScope::Full),
            "addresses" => Ok(FieldScope::Addresses),
            "classification" => Ok(FieldScope::Classification),
            other => Err(format!(
                "unknown field scope {:?} (expected full, addresses, or classification)",
                other
            )),
        }
    }
}

impl fmt::Display for FieldScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldScope::Full => "full",
            FieldScope::Addresses => "addresses",
            FieldScope::Classification => "classification",
        };
        f.write_str(s)
    }
}

/// Scoped field-set for an update; absent fields are never touched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch {
    pub website: Option<String>,
    pub contact: Option<ContactInfo>,
    pub annual_revenue: Option<i64>,
    pub public_facing: Option<bool>,
    pub tax_status: Option<String>,
    pub organization_type: Option<String>,
}

impl FieldPatch {
    pub fn is_empty(&self) -> bool {
        self.website.is_none()
            && self.contact.is_none()
            && self.annual_revenue.is_none()
            && self.public_facing.is_none()
            && self.tax_status.is_none()
            && self.organization_type.is_none()
    }
}

/// One pending write operation, tagged with its source row
#[derive(Debug, Clone)]
pub struct WriteOp {
    pub source_row: usize,
    pub ein: String,
    pub kind: WriteKind,
}

#[derive(Debug, Clone)]
pub enum WriteKind {
    Insert(NewRecord),
    Update(FieldPatch),
}

/// Outcome of resolving one candidate
#[derive(Debug, Clone)]
pub enum Resolution {
    Write(WriteOp),
    /// Policy says leave the existing record alone
    SkipDuplicate,
    /// Needs manual or downstream handling
    Review(ReviewReason),
}

/// Decides writes for one run, under one policy and one field scope
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    scope: FieldScope,
}

impl ConflictResolver {
    pub fn new(scope: FieldScope) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> FieldScope {
        self.scope
    }

    /// Resolve a candidate against its match
    ///
    /// Candidates with a malformed identifier never reach this point; the
    /// pipeline routes them to review directly.
    pub fn resolve(
        &self,
        candidate: &NormalizedCandidate,
        matched: Option<&CanonicalRecord>,
        policy: ConflictPolicy,
    ) -> Resolution {
        match matched {
            Some(existing) => match policy {
                ConflictPolicy::InsertOnly | ConflictPolicy::IgnoreDuplicate => {
                    Resolution::SkipDuplicate
                }
                ConflictPolicy::Merge => {
                    let patch = self.build_patch(candidate, existing);
                    if patch.is_empty() {
                        Resolution::SkipDuplicate
                    } else {
                        Resolution::Write(WriteOp {
                            source_row: candidate.source_row,
                            ein: existing.ein.clone(),
                            kind: WriteKind::Update(patch),
                        })
                    }
                }
            },
            None => match &candidate.ein {
                Some(ein) if !candidate.name.is_empty() => Resolution::Write(WriteOp {
                    source_row: candidate.source_row,
                    ein: ein.clone(),
                    kind: WriteKind::Insert(NewRecord {
                        ein: ein.clone(),
                        name: candidate.name.clone(),
                        website: candidate.website.clone(),
                        contact: candidate.contact.clone(),
                        annual_revenue: candidate.annual_revenue,
                        public_facing: candidate.public_facing,
                        tax_status: candidate.tax_status.clone(),
                        organization_type: candidate.organization_type.clone(),
                    }),
                }),
                Some(_) => Resolution::Review(ReviewReason::MissingName),
                None => Resolution::Review(ReviewReason::NoUsableIdentifier),
            },
        }
    }

    /// Build the update patch: in-scope fields the candidate actually
    /// provides, minus values already identical in the canonical record
    fn build_patch(&self, candidate: &NormalizedCandidate, existing: &CanonicalRecord) -> FieldPatch {
        let mut patch = FieldPatch::default();

        let scope = self.scope;
        let allows_website = matches!(scope, FieldScope::Full | FieldScope::Classification);
        let allows_classification = matches!(scope, FieldScope::Full | FieldScope::Classification);
        let allows_contact = matches!(scope, FieldScope::Full | FieldScope::Addresses);
        let allows_rest = matches!(scope, FieldScope::Full);

        if allows_website {
            if let Some(website) = &candidate.website {
                if existing.website.as_deref() != Some(website.as_str()) {
                    patch.website = Some(website.clone());
                }
            }
        }

        if allows_classification {
            if let Some(public_facing) = candidate.public_facing {
                if existing.public_facing != Some(public_facing) {
                    patch.public_facing = Some(public_facing);
                }
            }
        }

        if allows_contact
            && !candidate.contact.is_empty()
            && !same_address(&candidate.contact, &existing.contact)
        {
            patch.contact = Some(candidate.contact.clone());
        }

        if allows_rest {
            if let Some(revenue) = candidate.annual_revenue {
                if existing.annual_revenue != Some(revenue) {
                    patch.annual_revenue = Some(revenue);
                }
            }
            if let Some(tax_status) = &candidate.tax_status {
                if existing.tax_status.as_deref() != Some(tax_status.as_str()) {
                    patch.tax_status = Some(tax_status.clone());
                }
            }
            if let Some(org_type) = &candidate.organization_type {
                if existing.organization_type.as_deref() != Some(org_type.as_str()) {
                    patch.organization_type = Some(org_type.clone());
                }
            }
        }

        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candidate(ein: Option<&str>, name: &str) -> NormalizedCandidate {
        NormalizedCandidate {
            ein: ein.map(str::to_string),
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn canonical(ein: &str, name: &str) -> CanonicalRecord {
        CanonicalRecord {
            ein: ein.to_string(),
            name: name.to_string(),
            website: None,
            contact: ContactInfo::default(),
            annual_revenue: None,
            public_facing: None,
            tax_status: None,
            organization_type: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unmatched_with_ein_inserts() {
        let resolver = ConflictResolver::new(FieldScope::Full);
        let cand = candidate(Some("123456789"), "Example Foundation");

        match resolver.resolve(&cand, None, ConflictPolicy::Merge) {
            Resolution::Write(WriteOp {
                kind: WriteKind::Insert(record),
                ..
            }) => {
                assert_eq!(record.ein, "123456789");
                assert_eq!(record.name, "Example Foundation");
            }
            other => panic!("expected insert, got {:?}", other),
        }
    }

    #[test]
    fn test_unmatched_without_ein_goes_to_review() {
        let resolver = ConflictResolver::new(FieldScope::Full);
        let cand = candidate(None, "Teamsters Local 100 Trust Fund");

        match resolver.resolve(&cand, None, ConflictPolicy::Merge) {
            Resolution::Review(ReviewReason::NoUsableIdentifier) => {}
            other => panic!("expected review, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_only_skips_matched() {
        let resolver = ConflictResolver::new(FieldScope::Full);
        let mut cand = candidate(Some("123456789"), "Example Foundation");
        cand.website = Some("https://example.org".to_string());
        let existing = canonical("123456789", "Example Foundation");

        match resolver.resolve(&cand, Some(&existing), ConflictPolicy::InsertOnly) {
            Resolution::SkipDuplicate => {}
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_updates_only_in_scope_fields() {
        let resolver = ConflictResolver::new(FieldScope::Classification);
        let mut cand = candidate(Some("123456789"), "Example Foundation");
        cand.website = Some("https://example.org".to_string());
        cand.public_facing = Some(false);
        cand.annual_revenue = Some(1_000_000);
        cand.contact.city = Some("Springfield".to_string());
        let existing = canonical("123456789", "Example Foundation");

        match resolver.resolve(&cand, Some(&existing), ConflictPolicy::Merge) {
            Resolution::Write(WriteOp {
                kind: WriteKind::Update(patch),
                ..
            }) => {
                assert_eq!(patch.website.as_deref(), Some("https://example.org"));
                assert_eq!(patch.public_facing, Some(false));
                // Out of scope for a classification pass
                assert_eq!(patch.annual_revenue, None);
                assert_eq!(patch.contact, None);
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_with_identical_values_skips() {
        let resolver = ConflictResolver::new(FieldScope::Full);
        let mut cand = candidate(Some("123456789"), "Example Foundation");
        cand.website = Some("https://example.org".to_string());
        let mut existing = canonical("123456789", "Example Foundation");
        existing.website = Some("https://example.org".to_string());

        match resolver.resolve(&cand, Some(&existing), ConflictPolicy::Merge) {
            Resolution::SkipDuplicate => {}
            other => panic!("expected skip, got {:?}", other),
        }
    }
}
