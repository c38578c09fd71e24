//! PostgREST-style HTTP registry backend
//!
//! Talks to a hosted data API (e.g. a Supabase project) through its REST
//! surface. Conflict policies map onto the `Prefer: resolution=...` request
//! header. Writes here are row/chunk-level, so a batch can partially
//! succeed; failures are reported per row and retried by the applier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::error::{ReconError, ReconResult};
use crate::models::{CanonicalRecord, ContactInfo, NewRecord};
use crate::resolver::{ConflictPolicy, FieldPatch, WriteKind, WriteOp};
use crate::store::{BatchOutcome, RegistryStore, RowFailure};
use async_trait::async_trait;

const TABLE_PATH: &str = "rest/v1/nonprofits";
const USER_AGENT: &str = "orgsync/0.1.0";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// HTTP data API registry client
pub struct PostgrestStore {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Row shape returned by the data API
#[derive(Debug, Deserialize)]
struct RestRecord {
    ein: String,
    name: String,
    website: Option<String>,
    contact: Option<ContactInfo>,
    annual_revenue: Option<i64>,
    public_facing: Option<bool>,
    tax_status: Option<String>,
    organization_type: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RestRecord> for CanonicalRecord {
    fn from(row: RestRecord) -> Self {
        CanonicalRecord {
            ein: row.ein,
            name: row.name,
            website: row.website.filter(|w| !w.is_empty()),
            contact: row.contact.unwrap_or_default(),
            annual_revenue: row.annual_revenue,
            public_facing: row.public_facing,
            tax_status: row.tax_status,
            organization_type: row.organization_type,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Serialize)]
struct InsertRow<'a> {
    #[serde(flatten)]
    record: &'a NewRecord,
    created_at: String,
    updated_at: String,
}

impl PostgrestStore {
    pub fn new(endpoint: &str, api_key: &str) -> ReconResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ReconError::Config(format!("Build HTTP client failed: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/{}", self.base_url, TABLE_PATH)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn fetch_one(&self, query: &[(&str, String)]) -> ReconResult<Option<CanonicalRecord>> {
        let response = self
            .authed(self.http_client.get(self.table_url()))
            .query(query)
            .send()
            .await
            .map_err(|e| ReconError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReconError::Rejected(format!("{}: {}", status, body)));
        }

        let mut rows: Vec<RestRecord> = response
            .json()
            .await
            .map_err(|e| ReconError::Rejected(format!("Parse lookup response failed: {}", e)))?;

        Ok(rows.pop().map(CanonicalRecord::from))
    }

    /// POST one chunk of inserts; failures mark every row in the chunk
    async fn post_inserts(
        &self,
        chunk: &[&WriteOp],
        policy: ConflictPolicy,
        outcome: &mut BatchOutcome,
    ) {
        let resolution = match policy {
            ConflictPolicy::Merge => "merge-duplicates",
            ConflictPolicy::InsertOnly | ConflictPolicy::IgnoreDuplicate => "ignore-duplicates",
        };

        let now = Utc::now().to_rfc3339();
        let body: Vec<InsertRow> = chunk
            .iter()
            .filter_map(|op| match &op.kind {
                WriteKind::Insert(record) => Some(InsertRow {
                    record,
                    created_at: now.clone(),
                    updated_at: now.clone(),
                }),
                WriteKind::Update(_) => None,
            })
            .collect();

        let result = self
            .authed(self.http_client.post(self.table_url()))
            .header(
                "Prefer",
                format!("resolution={},return=representation", resolution),
            )
            .json(&body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                let applied = response
                    .json::<Vec<serde_json::Value>>()
                    .await
                    .map(|rows| rows.len() as u64)
                    .unwrap_or(chunk.len() as u64);
                outcome.inserted += applied;
                outcome.skipped += chunk.len() as u64 - applied.min(chunk.len() as u64);
            }
            Ok(response) => {
                let status = response.status();
                let detail = response.text().await.unwrap_or_default();
                let error = format!("{}: {}", status, truncate(&detail, 200));
                for op in chunk {
                    outcome.failed_rows.push(RowFailure {
                        source_row: op.source_row,
                        ein: op.ein.clone(),
                        error: error.clone(),
                    });
                }
            }
            Err(e) => {
                for op in chunk {
                    outcome.failed_rows.push(RowFailure {
                        source_row: op.source_row,
                        ein: op.ein.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    async fn patch_update(&self, op: &WriteOp, patch: &FieldPatch, outcome: &mut BatchOutcome) {
        let mut body = serde_json::Map::new();
        if let Some(website) = &patch.website {
            body.insert("website".to_string(), json!(website));
        }
        if let Some(contact) = &patch.contact {
            body.insert("contact".to_string(), json!(contact));
        }
        if let Some(revenue) = patch.annual_revenue {
            body.insert("annual_revenue".to_string(), json!(revenue));
        }
        if let Some(public_facing) = patch.public_facing {
            body.insert("public_facing".to_string(), json!(public_facing));
        }
        if let Some(tax_status) = &patch.tax_status {
            body.insert("tax_status".to_string(), json!(tax_status));
        }
        if let Some(org_type) = &patch.organization_type {
            body.insert("organization_type".to_string(), json!(org_type));
        }
        body.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let result = self
            .authed(self.http_client.patch(self.table_url()))
            .query(&[("ein", format!("eq.{}", op.ein))])
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => outcome.updated += 1,
            Ok(response) => {
                let status = response.status();
                let detail = response.text().await.unwrap_or_default();
                outcome.failed_rows.push(RowFailure {
                    source_row: op.source_row,
                    ein: op.ein.clone(),
                    error: format!("{}: {}", status, truncate(&detail, 200)),
                });
            }
            Err(e) => outcome.failed_rows.push(RowFailure {
                source_row: op.source_row,
                ein: op.ein.clone(),
                error: e.to_string(),
            }),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl RegistryStore for PostgrestStore {
    async fn ping(&self) -> ReconResult<()> {
        let response = self
            .authed(self.http_client.get(self.table_url()))
            .query(&[("select", "ein"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| ReconError::Config(format!("Store unreachable: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ReconError::Config(format!(
                "Store rejected probe: {}",
                response.status()
            )))
        }
    }

    async fn find_by_ein(&self, ein: &str) -> ReconResult<Option<CanonicalRecord>> {
        self.fetch_one(&[
            ("select", "*".to_string()),
            ("ein", format!("eq.{}", ein)),
            ("limit", "1".to_string()),
        ])
        .await
    }

    async fn find_by_name(&self, name: &str) -> ReconResult<Option<CanonicalRecord>> {
        // ilike without wildcards: exact match, case-insensitive
        self.fetch_one(&[
            ("select", "*".to_string()),
            ("name", format!("ilike.{}", name)),
            ("limit", "1".to_string()),
        ])
        .await
    }

    async fn apply_batch(
        &self,
        ops: &[WriteOp],
        policy: ConflictPolicy,
    ) -> ReconResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();

        // Consecutive inserts go up as one chunk; updates flush the chunk
        // first so batch order is preserved
        let mut pending_inserts: Vec<&WriteOp> = Vec::new();
        for op in ops {
            match &op.kind {
                WriteKind::Insert(_) => pending_inserts.push(op),
                WriteKind::Update(patch) => {
                    if !pending_inserts.is_empty() {
                        self.post_inserts(&pending_inserts, policy, &mut outcome).await;
                        pending_inserts.clear();
                    }
                    self.patch_update(op, patch, &mut outcome).await;
                }
            }
        }
        if !pending_inserts.is_empty() {
            self.post_inserts(&pending_inserts, policy, &mut outcome).await;
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let store = PostgrestStore::new("https://example.supabase.co/", "anon-key");
        assert!(store.is_ok());
        assert_eq!(
            store.unwrap().table_url(),
            "https://example.supabase.co/rest/v1/nonprofits"
        );
    }

    #[test]
    fn test_insert_row_serialization_omits_absent_fields() {
        let record = NewRecord {
            ein: "123456789".to_string(),
            name: "Example Foundation".to_string(),
            website: Some("https://example.org".to_string()),
            ..Default::default()
        };
        let row = InsertRow {
            record: &record,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        };

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["ein"], "123456789");
        assert_eq!(json["website"], "https://example.org");
        // Absent fields must not appear, so merge-duplicates preserves them
        assert!(json.get("public_facing").is_none());
        assert!(json.get("contact").is_none());
    }
}
