//! End-to-end pipeline tests over an in-memory registry
//!
//! Covers the policy semantics (insert-only no-op rerun, merge idempotence,
//! ignore-duplicate silent skip), checkpointed resumability, scoped update
//! passes, and the three-candidate reconciliation scenario.

use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;

use orgsync_recon::checkpoint::Checkpoint;
use orgsync_recon::classify::Classifier;
use orgsync_recon::config::ReconConfig;
use orgsync_recon::models::{CandidateRecord, ReviewReason, RunReport};
use orgsync_recon::resolver::{ConflictPolicy, FieldScope};
use orgsync_recon::source::VecSource;
use orgsync_recon::store::{RegistryStore, SqliteStore};
use orgsync_recon::ReconciliationPipeline;

fn fast_config(policy: ConflictPolicy, scope: FieldScope) -> ReconConfig {
    ReconConfig {
        batch_size: 2,
        retry_budget: 1,
        retry_backoff: Duration::from_millis(1),
        pacing_delay: Duration::from_millis(1),
        policy,
        scope,
    }
}

async fn run_pipeline(
    store: &SqliteStore,
    config: ReconConfig,
    checkpoint_path: &Path,
    rows: Vec<CandidateRecord>,
) -> RunReport {
    let checkpoint = Checkpoint::load(checkpoint_path).unwrap();
    let source = VecSource::new("test", rows);
    ReconciliationPipeline::new(store, config, Classifier::default(), checkpoint)
        .run(&source)
        .await
        .unwrap()
}

fn candidate(ein: &str, name: &str) -> CandidateRecord {
    CandidateRecord {
        ein: Some(ein.to_string()),
        name: name.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_end_to_end_reconciliation_scenario() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::in_memory().await.unwrap();

    let rows = vec![
        CandidateRecord {
            source_row: 0,
            ein: Some("12-3456789".to_string()),
            name: "Example Foundation".to_string(),
            website: Some("WWW.EXAMPLE.ORG".to_string()),
            ..Default::default()
        },
        // Same org from a later source, explicit classification override
        CandidateRecord {
            source_row: 1,
            ein: Some("123456789".to_string()),
            name: "Example Foundation".to_string(),
            public_facing: Some(false),
            ..Default::default()
        },
        // No usable identifier and no existing name match
        CandidateRecord {
            source_row: 2,
            ein: Some("".to_string()),
            name: "Teamsters Local 100 Trust Fund".to_string(),
            ..Default::default()
        },
    ];

    let report = run_pipeline(
        &store,
        fast_config(ConflictPolicy::Merge, FieldScope::Full),
        &dir.path().join("checkpoint.json"),
        rows,
    )
    .await;

    assert_eq!(report.total_seen, 3);
    assert_eq!(report.failed, 0);
    assert!(report.failures.is_empty());

    // One canonical record, under the normalized identifier
    let record = store.find_by_ein("123456789").await.unwrap().unwrap();
    assert_eq!(record.name, "Example Foundation");
    assert_eq!(record.website.as_deref(), Some("https://example.org"));
    // Explicit classification overrides the heuristic ("foundation" would
    // have classified public)
    assert_eq!(record.public_facing, Some(false));

    // Record 3 lands on the review list
    assert_eq!(report.review.len(), 1);
    let entry = &report.review[0];
    assert_eq!(entry.source_row, 2);
    assert_eq!(entry.name, "Teamsters Local 100 Trust Fund");
    assert_eq!(entry.reason, ReviewReason::NoUsableIdentifier);
    assert!(store
        .find_by_name("Teamsters Local 100 Trust Fund")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_insert_only_rerun_is_pure_noop() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::in_memory().await.unwrap();
    let rows = vec![
        candidate("000000001", "Org One"),
        candidate("000000002", "Org Two"),
        candidate("000000003", "Org Three"),
    ];

    let first = run_pipeline(
        &store,
        fast_config(ConflictPolicy::InsertOnly, FieldScope::Full),
        &dir.path().join("first.json"),
        rows.clone(),
    )
    .await;
    assert_eq!(first.inserted, 3);

    // Fresh checkpoint so every row is reprocessed against the store
    let second = run_pipeline(
        &store,
        fast_config(ConflictPolicy::InsertOnly, FieldScope::Full),
        &dir.path().join("second.json"),
        rows,
    )
    .await;

    assert_eq!(second.inserted, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.skipped_duplicate, 3);
    assert!(second.failures.is_empty());
}

#[tokio::test]
async fn test_merge_rerun_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::in_memory().await.unwrap();
    let rows = vec![
        CandidateRecord {
            source_row: 0,
            ein: Some("000000001".to_string()),
            name: "Riverside Museum".to_string(),
            website: Some("www.riverside-museum.example.org".to_string()),
            annual_revenue: Some(750_000),
            ..Default::default()
        },
        candidate("000000002", "Org Two"),
    ];

    run_pipeline(
        &store,
        fast_config(ConflictPolicy::Merge, FieldScope::Full),
        &dir.path().join("first.json"),
        rows.clone(),
    )
    .await;
    let after_first = store.find_by_ein("000000001").await.unwrap().unwrap();

    let second = run_pipeline(
        &store,
        fast_config(ConflictPolicy::Merge, FieldScope::Full),
        &dir.path().join("second.json"),
        rows,
    )
    .await;
    let after_second = store.find_by_ein("000000001").await.unwrap().unwrap();

    assert_eq!(after_first, after_second);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.skipped_duplicate, 2);
}

#[tokio::test]
async fn test_ignore_duplicate_skips_silently() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::in_memory().await.unwrap();

    run_pipeline(
        &store,
        fast_config(ConflictPolicy::Merge, FieldScope::Full),
        &dir.path().join("seed.json"),
        vec![CandidateRecord {
            source_row: 0,
            ein: Some("000000001".to_string()),
            name: "Org One".to_string(),
            website: Some("www.org-one.example.org".to_string()),
            ..Default::default()
        }],
    )
    .await;

    // Duplicate identifier with different data: skipped, never updated
    let report = run_pipeline(
        &store,
        fast_config(ConflictPolicy::IgnoreDuplicate, FieldScope::Full),
        &dir.path().join("dup.json"),
        vec![CandidateRecord {
            source_row: 0,
            ein: Some("000000001".to_string()),
            name: "Org One Renamed".to_string(),
            website: Some("www.somewhere-else.example.org".to_string()),
            ..Default::default()
        }],
    )
    .await;

    assert_eq!(report.inserted, 0);
    assert_eq!(report.updated, 0);
    assert_eq!(report.skipped_duplicate, 1);
    assert!(report.failures.is_empty());

    let record = store.find_by_ein("000000001").await.unwrap().unwrap();
    assert_eq!(record.name, "Org One");
    assert_eq!(record.website.as_deref(), Some("https://www.org-one.example.org"));
}

#[tokio::test]
async fn test_checkpoint_resume_matches_uninterrupted_run() {
    let dir = TempDir::new().unwrap();
    let rows: Vec<CandidateRecord> = (1..=5)
        .map(|i| candidate(&format!("00000000{}", i), &format!("Org {}", i)))
        .collect();

    // Interrupted run: only the first batch's worth of input arrives before
    // the process dies; the checkpoint survives
    let interrupted = SqliteStore::in_memory().await.unwrap();
    let checkpoint_path = dir.path().join("resume.json");
    let first = run_pipeline(
        &interrupted,
        fast_config(ConflictPolicy::Merge, FieldScope::Full),
        &checkpoint_path,
        rows[..2].to_vec(),
    )
    .await;
    assert_eq!(first.inserted, 2);

    // Restart over the full input with the persisted checkpoint
    let second = run_pipeline(
        &interrupted,
        fast_config(ConflictPolicy::Merge, FieldScope::Full),
        &checkpoint_path,
        rows.clone(),
    )
    .await;
    assert_eq!(second.skipped_duplicate, 2);
    assert_eq!(second.inserted, 3);

    // Uninterrupted reference run
    let reference = SqliteStore::in_memory().await.unwrap();
    run_pipeline(
        &reference,
        fast_config(ConflictPolicy::Merge, FieldScope::Full),
        &dir.path().join("reference.json"),
        rows.clone(),
    )
    .await;

    for row in &rows {
        let ein = row.ein.as_ref().unwrap();
        let resumed = interrupted.find_by_ein(ein).await.unwrap().unwrap();
        let expected = reference.find_by_ein(ein).await.unwrap().unwrap();
        assert_eq!(resumed.name, expected.name);
        assert_eq!(resumed.website, expected.website);
        assert_eq!(resumed.public_facing, expected.public_facing);
    }
}

#[tokio::test]
async fn test_address_scope_never_touches_other_fields() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::in_memory().await.unwrap();

    run_pipeline(
        &store,
        fast_config(ConflictPolicy::Merge, FieldScope::Full),
        &dir.path().join("seed.json"),
        vec![CandidateRecord {
            source_row: 0,
            ein: Some("000000001".to_string()),
            name: "Org One".to_string(),
            website: Some("www.org-one.example.org".to_string()),
            annual_revenue: Some(500_000),
            ..Default::default()
        }],
    )
    .await;

    // Address-fix pass; the candidate also carries a website it must not write
    let report = run_pipeline(
        &store,
        fast_config(ConflictPolicy::Merge, FieldScope::Addresses),
        &dir.path().join("fix.json"),
        vec![CandidateRecord {
            source_row: 0,
            ein: Some("000000001".to_string()),
            name: "Org One".to_string(),
            website: Some("www.wrong-site.example.org".to_string()),
            street: Some("1 Main St".to_string()),
            city: Some("Springfield".to_string()),
            state: Some("IL".to_string()),
            postal_code: Some("62704".to_string()),
            ..Default::default()
        }],
    )
    .await;
    assert_eq!(report.updated, 1);

    let record = store.find_by_ein("000000001").await.unwrap().unwrap();
    assert_eq!(record.contact.city.as_deref(), Some("Springfield"));
    assert_eq!(record.contact.zip.as_deref(), Some("62704"));
    // Out-of-scope fields survive untouched
    assert_eq!(record.website.as_deref(), Some("https://www.org-one.example.org"));
    assert_eq!(record.annual_revenue, Some(500_000));
}

#[tokio::test]
async fn test_malformed_identifier_goes_to_review() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::in_memory().await.unwrap();

    let report = run_pipeline(
        &store,
        fast_config(ConflictPolicy::Merge, FieldScope::Full),
        &dir.path().join("checkpoint.json"),
        vec![
            candidate("not-a-number", "Broken Org"),
            candidate("000000002", "Valid Org"),
        ],
    )
    .await;

    assert_eq!(report.invalid_identifier, 1);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.review.len(), 1);
    assert!(matches!(
        report.review[0].reason,
        ReviewReason::MalformedIdentifier(_)
    ));
    assert!(store.find_by_ein("000000002").await.unwrap().is_some());
}

#[tokio::test]
async fn test_heuristic_never_overwrites_stored_classification() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::in_memory().await.unwrap();

    // Explicitly classified non-public, despite the "foundation" keyword
    run_pipeline(
        &store,
        fast_config(ConflictPolicy::Merge, FieldScope::Full),
        &dir.path().join("seed.json"),
        vec![CandidateRecord {
            source_row: 0,
            ein: Some("000000001".to_string()),
            name: "Acme Employee Benefit Foundation".to_string(),
            public_facing: Some(false),
            ..Default::default()
        }],
    )
    .await;

    // Same org again, without any explicit classification; the heuristic
    // must not override the stored value
    run_pipeline(
        &store,
        fast_config(ConflictPolicy::Merge, FieldScope::Full),
        &dir.path().join("again.json"),
        vec![CandidateRecord {
            source_row: 0,
            ein: Some("000000001".to_string()),
            name: "Acme Employee Benefit Foundation".to_string(),
            website: Some("www.acme-benefits.example.org".to_string()),
            ..Default::default()
        }],
    )
    .await;

    let record = store.find_by_ein("000000001").await.unwrap().unwrap();
    assert_eq!(record.public_facing, Some(false));
    assert_eq!(
        record.website.as_deref(),
        Some("https://www.acme-benefits.example.org")
    );
}
