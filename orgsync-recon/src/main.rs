//! orgsync-recon - registry reconciliation runner
//!
//! Replaces the pile of one-off load/fix/classify scripts with a single
//! parameterized run: pick a candidate CSV, a conflict policy, and a field
//! scope; the engine does the rest and prints the final report.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use orgsync_common::config::{self, TomlConfig};
use orgsync_recon::checkpoint::Checkpoint;
use orgsync_recon::classify::Classifier;
use orgsync_recon::config::ReconConfig;
use orgsync_recon::models::RunReport;
use orgsync_recon::resolver::{ConflictPolicy, FieldScope};
use orgsync_recon::source::CsvSource;
use orgsync_recon::store::{PostgrestStore, RegistryStore, SqliteStore};
use orgsync_recon::ReconciliationPipeline;

#[derive(Parser, Debug)]
#[command(
    name = "orgsync-recon",
    version,
    about = "Reconcile candidate nonprofit records into the canonical registry"
)]
struct Cli {
    /// Candidate CSV file to reconcile
    #[arg(long)]
    input: PathBuf,

    /// Conflict policy: insert-only, merge, or ignore-duplicate
    #[arg(long, default_value = "merge")]
    policy: ConflictPolicy,

    /// Update allow-list: full, addresses, or classification
    #[arg(long, default_value = "full")]
    scope: FieldScope,

    /// Store backend: sqlite or postgrest (overrides config file)
    #[arg(long)]
    backend: Option<String>,

    /// SQLite database path (sqlite backend)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// HTTP data API base URL (postgrest backend)
    #[arg(long, env = "ORGSYNC_ENDPOINT")]
    endpoint: Option<String>,

    /// HTTP data API key (postgrest backend)
    #[arg(long, env = "ORGSYNC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Checkpoint file; a previous run's checkpoint resumes it
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Config file (default: platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Operations per batch
    #[arg(long)]
    batch_size: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("Starting orgsync-recon");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Config file is optional; compiled defaults cover everything
    let toml_config = match config::resolve_config_path(cli.config.as_deref()) {
        Some(path) => {
            info!("Config: {}", path.display());
            config::load_toml_config(&path)?
        }
        None => TomlConfig::default(),
    };

    let mut recon_config = ReconConfig::resolve(&toml_config.engine);
    recon_config.policy = cli.policy;
    recon_config.scope = cli.scope;
    if let Some(batch_size) = cli.batch_size {
        recon_config.batch_size = batch_size;
    }

    let store = open_store(&cli, &toml_config).await?;

    let checkpoint_path = cli
        .checkpoint
        .clone()
        .unwrap_or_else(|| config::default_data_dir().join("checkpoint.json"));
    info!("Checkpoint: {}", checkpoint_path.display());
    let checkpoint = Checkpoint::load(&checkpoint_path)?;

    let classifier = Classifier::from_config(&toml_config.keywords);
    let source = CsvSource::new(&cli.input);

    // Ctrl-C stops at the next batch boundary; the checkpoint is persisted
    // before exit
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing current batch");
            signal_token.cancel();
        }
    });

    let pipeline =
        ReconciliationPipeline::new(store.as_ref(), recon_config, classifier, checkpoint)
            .with_cancellation(cancel);

    let report = pipeline
        .run(&source)
        .await
        .with_context(|| format!("Reconciliation of {} failed", cli.input.display()))?;

    render_report(&report);

    if report.failures.is_empty() {
        Ok(())
    } else {
        Err(anyhow!(
            "{} batch(es) failed; see failure list above for replay",
            report.failures.len()
        ))
    }
}

async fn open_store(cli: &Cli, toml_config: &TomlConfig) -> Result<Box<dyn RegistryStore>> {
    let backend = cli
        .backend
        .clone()
        .or_else(|| toml_config.backend.clone())
        .unwrap_or_else(|| "sqlite".to_string());

    match backend.as_str() {
        "sqlite" => {
            let db_path = cli
                .db_path
                .clone()
                .or_else(|| toml_config.db_path.clone().map(PathBuf::from))
                .unwrap_or_else(|| config::default_data_dir().join("registry.db"));
            info!("Store: sqlite {}", db_path.display());
            Ok(Box::new(SqliteStore::connect(&db_path).await?))
        }
        "postgrest" => {
            let endpoint = cli
                .endpoint
                .clone()
                .or_else(|| toml_config.endpoint.clone())
                .ok_or_else(|| anyhow!("postgrest backend requires --endpoint or config"))?;
            let api_key = cli
                .api_key
                .clone()
                .or_else(|| toml_config.api_key.clone())
                .ok_or_else(|| anyhow!("postgrest backend requires --api-key or config"))?;
            info!("Store: postgrest {}", endpoint);
            Ok(Box::new(PostgrestStore::new(&endpoint, &api_key)?))
        }
        other => Err(anyhow!(
            "unknown backend {:?} (expected sqlite or postgrest)",
            other
        )),
    }
}

fn render_report(report: &RunReport) {
    println!();
    println!("Run {} ({})", report.run_id, report.source);
    println!("  total seen:         {}", report.total_seen);
    println!("  invalid identifier: {}", report.invalid_identifier);
    println!("  matched:            {}", report.matched);
    println!("  inserted:           {}", report.inserted);
    println!("  updated:            {}", report.updated);
    println!("  skipped duplicate:  {}", report.skipped_duplicate);
    println!("  failed:             {}", report.failed);
    println!("  for review:         {}", report.review.len());
    if report.cancelled {
        println!("  (cancelled; re-run with the same checkpoint to resume)");
    }

    if !report.review.is_empty() {
        println!();
        println!("Review list:");
        for entry in &report.review {
            println!("  row {}: {} - {}", entry.source_row, entry.name, entry.reason);
        }
    }

    if !report.failures.is_empty() {
        println!();
        println!("Failed batches:");
        for failure in &report.failures {
            println!(
                "  batch {} (rows {:?}, eins {:?}): {}",
                failure.batch_index, failure.source_rows, failure.eins, failure.error
            );
        }
    }
}
