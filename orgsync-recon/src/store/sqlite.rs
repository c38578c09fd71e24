//! SQLite registry backend
//!
//! Batches are applied inside a single transaction, so a batch either
//! commits whole or not at all. Conflict policies map onto `ON CONFLICT`
//! clauses; merge preserves existing values where the incoming row is null,
//! so a same-run duplicate cannot blank out a field an earlier row set.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::error::{ReconError, ReconResult};
use crate::models::{CanonicalRecord, ContactInfo, NewRecord};
use crate::resolver::{ConflictPolicy, FieldPatch, WriteKind, WriteOp};
use crate::store::{BatchOutcome, RegistryStore};
use async_trait::async_trait;

/// SQLite-backed canonical registry
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the registry database at the given path
    pub async fn connect(db_path: &Path) -> ReconResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ReconError::Config(format!("Create data dir failed: {}", e)))?;
        }

        // mode=rwc: read, write, create
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        tracing::debug!(url = %db_url, "Connecting to registry database");

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(|e| ReconError::Config(format!("Open {} failed: {}", db_path.display(), e)))?;

        init_tables(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory registry for tests; single connection so all queries see
    /// the same database
    pub async fn in_memory() -> ReconResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| ReconError::Config(format!("Open in-memory db failed: {}", e)))?;
        init_tables(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Create the nonprofits table and name index if they don't exist
async fn init_tables(pool: &SqlitePool) -> ReconResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS nonprofits (
            ein TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            website TEXT,
            contact TEXT,
            annual_revenue INTEGER,
            public_facing INTEGER,
            tax_status TEXT,
            organization_type TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_nonprofits_name ON nonprofits (name COLLATE NOCASE)",
    )
    .execute(pool)
    .await?;

    tracing::debug!("Registry tables initialized (nonprofits)");
    Ok(())
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> ReconResult<CanonicalRecord> {
    let contact_json: Option<String> = row.get("contact");
    let contact = match contact_json {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| ReconError::Rejected(format!("Corrupt contact JSON: {}", e)))?,
        None => ContactInfo::default(),
    };

    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(CanonicalRecord {
        ein: row.get("ein"),
        name: row.get("name"),
        website: row.get("website"),
        contact,
        annual_revenue: row.get("annual_revenue"),
        public_facing: row.get::<Option<bool>, _>("public_facing"),
        tax_status: row.get("tax_status"),
        organization_type: row.get("organization_type"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn parse_timestamp(raw: &str) -> ReconResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ReconError::Rejected(format!("Corrupt timestamp {:?}: {}", raw, e)))
}

fn contact_json(contact: &ContactInfo) -> ReconResult<Option<String>> {
    if contact.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(contact)
        .map(Some)
        .map_err(|e| ReconError::Rejected(format!("Serialize contact failed: {}", e)))
}

const SELECT_COLUMNS: &str = "ein, name, website, contact, annual_revenue, public_facing, \
                              tax_status, organization_type, created_at, updated_at";

async fn insert_record<'a>(
    tx: &mut sqlx::Transaction<'a, sqlx::Sqlite>,
    record: &NewRecord,
    policy: ConflictPolicy,
    now: &str,
) -> ReconResult<u64> {
    let conflict_clause = match policy {
        ConflictPolicy::InsertOnly | ConflictPolicy::IgnoreDuplicate => {
            "ON CONFLICT(ein) DO NOTHING"
        }
        // New values overwrite old; old values preserved where new is null
        ConflictPolicy::Merge => {
            "ON CONFLICT(ein) DO UPDATE SET
                name = excluded.name,
                website = COALESCE(excluded.website, website),
                contact = COALESCE(excluded.contact, contact),
                annual_revenue = COALESCE(excluded.annual_revenue, annual_revenue),
                public_facing = COALESCE(excluded.public_facing, public_facing),
                tax_status = COALESCE(excluded.tax_status, tax_status),
                organization_type = COALESCE(excluded.organization_type, organization_type),
                updated_at = excluded.updated_at"
        }
    };

    let sql = format!(
        r#"
        INSERT INTO nonprofits
            (ein, name, website, contact, annual_revenue, public_facing,
             tax_status, organization_type, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        {}
        "#,
        conflict_clause
    );

    let result = sqlx::query(&sql)
        .bind(&record.ein)
        .bind(&record.name)
        .bind(&record.website)
        .bind(contact_json(&record.contact)?)
        .bind(record.annual_revenue)
        .bind(record.public_facing)
        .bind(&record.tax_status)
        .bind(&record.organization_type)
        .bind(now)
        .bind(now)
        .execute(&mut **tx)
        .await?;

    Ok(result.rows_affected())
}

async fn update_record<'a>(
    tx: &mut sqlx::Transaction<'a, sqlx::Sqlite>,
    ein: &str,
    patch: &FieldPatch,
    now: &str,
) -> ReconResult<u64> {
    // Column names are static; only values are bound
    let mut sets: Vec<&str> = Vec::new();
    if patch.website.is_some() {
        sets.push("website = ?");
    }
    if patch.contact.is_some() {
        sets.push("contact = ?");
    }
    if patch.annual_revenue.is_some() {
        sets.push("annual_revenue = ?");
    }
    if patch.public_facing.is_some() {
        sets.push("public_facing = ?");
    }
    if patch.tax_status.is_some() {
        sets.push("tax_status = ?");
    }
    if patch.organization_type.is_some() {
        sets.push("organization_type = ?");
    }

    if sets.is_empty() {
        return Ok(0);
    }

    let sql = format!(
        "UPDATE nonprofits SET {}, updated_at = ? WHERE ein = ?",
        sets.join(", ")
    );

    let mut query = sqlx::query(&sql);
    if let Some(website) = &patch.website {
        query = query.bind(website);
    }
    if let Some(contact) = &patch.contact {
        query = query.bind(contact_json(contact)?);
    }
    if let Some(revenue) = patch.annual_revenue {
        query = query.bind(revenue);
    }
    if let Some(public_facing) = patch.public_facing {
        query = query.bind(public_facing);
    }
    if let Some(tax_status) = &patch.tax_status {
        query = query.bind(tax_status);
    }
    if let Some(org_type) = &patch.organization_type {
        query = query.bind(org_type);
    }

    let result = query.bind(now).bind(ein).execute(&mut **tx).await?;
    Ok(result.rows_affected())
}

#[async_trait]
impl RegistryStore for SqliteStore {
    async fn ping(&self) -> ReconResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_by_ein(&self, ein: &str) -> ReconResult<Option<CanonicalRecord>> {
        let sql = format!("SELECT {} FROM nonprofits WHERE ein = ?", SELECT_COLUMNS);
        let row = sqlx::query(&sql).bind(ein).fetch_optional(&self.pool).await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn find_by_name(&self, name: &str) -> ReconResult<Option<CanonicalRecord>> {
        let sql = format!(
            "SELECT {} FROM nonprofits WHERE name = ? COLLATE NOCASE LIMIT 1",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn apply_batch(
        &self,
        ops: &[WriteOp],
        policy: ConflictPolicy,
    ) -> ReconResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        for op in ops {
            match &op.kind {
                WriteKind::Insert(record) => {
                    // Existence probe distinguishes insert from merge-update
                    // and conflict-skip for the counters
                    let exists: bool =
                        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM nonprofits WHERE ein = ?)")
                            .bind(&record.ein)
                            .fetch_one(&mut *tx)
                            .await?;

                    let affected = insert_record(&mut tx, record, policy, &now).await?;
                    match (exists, affected) {
                        (false, _) => outcome.inserted += 1,
                        (true, 0) => outcome.skipped += 1,
                        (true, _) => outcome.updated += 1,
                    }
                }
                WriteKind::Update(patch) => {
                    let affected = update_record(&mut tx, &op.ein, patch, &now).await?;
                    if affected > 0 {
                        outcome.updated += 1;
                    } else {
                        outcome.skipped += 1;
                    }
                }
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }
}
