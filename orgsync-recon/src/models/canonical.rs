//! Canonical registry records
//!
//! The authoritative, persisted representation of an organization, keyed by
//! its 9-digit identifier. The contact sub-record is stored as a JSON column,
//! matching the registry's `contact` JSONB field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured address sub-record; all fields nullable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ContactInfo {
    /// True when every sub-field is absent
    pub fn is_empty(&self) -> bool {
        self.address.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.zip.is_none()
            && self.phone.is_none()
    }
}

/// The one authoritative stored representation of an organization
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    /// 9-digit numeric identifier; primary key, immutable once assigned
    pub ein: String,
    pub name: String,
    /// Normalized absolute URL or `None`; never an empty string
    pub website: Option<String>,
    pub contact: ContactInfo,
    /// Non-negative, whole dollars
    pub annual_revenue: Option<i64>,
    /// `None` = unclassified
    pub public_facing: Option<bool>,
    pub tax_status: Option<String>,
    pub organization_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field-set for a new canonical record; the store assigns timestamps at
/// write time
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewRecord {
    pub ein: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "ContactInfo::is_empty")]
    pub contact: ContactInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_revenue: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_facing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_type: Option<String>,
}
