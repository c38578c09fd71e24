//! Heuristic public-facing classification
//!
//! Assigns a boolean category from name keywords when no authoritative
//! classification exists. Decision order: any public-facing indicator wins,
//! then any non-public-facing indicator, then default public (a hidden real
//! charity costs more than a mistakenly listed benefit trust). Never applied
//! over an explicit classification; the pipeline enforces that.

use orgsync_common::config::KeywordsToml;

/// Names that indicate a member-serving entity rather than a public charity
const NON_PUBLIC_FACING_KEYWORDS: &[&str] = &[
    "veba",
    "benefit",
    "benefits",
    "plan",
    "master trust",
    "retire",
    "retirees",
    "postretirement",
    "post-retirement",
    "insurance",
    "reinsurance",
    "sick leave",
    "vacation trust",
    "life insurance",
    "disability",
    "apprenticeship",
    "training trust",
    "teamsters",
    "ibew",
    "operating engineers",
    "laborers",
    "carpenters",
    "sheet metal",
    "plumbers",
    "electrical workers",
    "security fund",
    "trust fund",
    "health & welfare",
    "health and welfare",
    "welfare fund",
    "pension",
    "annuity",
    "401k",
    "defined benefit",
];

/// Names that indicate a public-serving institution
const PUBLIC_FACING_KEYWORDS: &[&str] = &[
    "university",
    "school",
    "college",
    "hospital",
    "medical center",
    "medical group",
    "clinic",
    "health system",
    "foundation",
    "charitable foundation",
    "donor-advised",
    "museum",
    "library",
    "public charity",
    "community clinic",
    "cooperative",
    "authority",
    "transit",
    "power",
    "water",
    "church",
    "temple",
    "synagogue",
    "ministry",
    "mission",
    "food bank",
    "shelter",
    "community center",
    "ymca",
    "ywca",
    "boys club",
    "girls club",
    "scouts",
    "fire department",
    "rescue",
    "ambulance",
];

/// Keyword-based classifier with two disjoint indicator sets
#[derive(Debug, Clone)]
pub struct Classifier {
    public: Vec<String>,
    non_public: Vec<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(
            PUBLIC_FACING_KEYWORDS.iter().map(|k| k.to_string()),
            NON_PUBLIC_FACING_KEYWORDS.iter().map(|k| k.to_string()),
        )
    }
}

impl Classifier {
    /// Build a classifier from explicit keyword tables (stored lowercased)
    pub fn new(
        public: impl IntoIterator<Item = String>,
        non_public: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            public: public.into_iter().map(|k| k.to_lowercase()).collect(),
            non_public: non_public.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Build from the config file's keyword section, falling back to the
    /// built-in tables for any list not overridden
    pub fn from_config(keywords: &KeywordsToml) -> Self {
        let public = keywords
            .public_facing
            .clone()
            .unwrap_or_else(|| PUBLIC_FACING_KEYWORDS.iter().map(|k| k.to_string()).collect());
        let non_public = keywords.non_public_facing.clone().unwrap_or_else(|| {
            NON_PUBLIC_FACING_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect()
        });
        Self::new(public, non_public)
    }

    /// Classify an organization name; public wins when both sets match
    pub fn classify(&self, name: &str) -> bool {
        let name_lower = name.to_lowercase();

        if self.public.iter().any(|k| name_lower.contains(k.as_str())) {
            return true;
        }
        if self
            .non_public
            .iter()
            .any(|k| name_lower.contains(k.as_str()))
        {
            return false;
        }

        true
    }
}
