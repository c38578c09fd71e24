//! Configuration loading and config file resolution
//!
//! Resolution follows the priority order used across orgsync tools:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file in the platform config directory
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML configuration file contents (`orgsync.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Registry store backend: "sqlite" or "postgrest"
    pub backend: Option<String>,

    /// SQLite database path (sqlite backend)
    pub db_path: Option<String>,

    /// HTTP data API base URL (postgrest backend)
    pub endpoint: Option<String>,

    /// HTTP data API key (postgrest backend)
    pub api_key: Option<String>,

    /// Engine tuning knobs
    #[serde(default)]
    pub engine: EngineToml,

    /// Classifier keyword table overrides
    #[serde(default)]
    pub keywords: KeywordsToml,
}

/// Engine tuning section of the TOML config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineToml {
    /// Operations per batch (50-1000 in practice)
    pub batch_size: Option<usize>,
    /// Submission attempts per batch before it is recorded as failed
    pub retry_budget: Option<u32>,
    /// Delay between retry attempts, milliseconds
    pub retry_backoff_ms: Option<u64>,
    /// Pacing delay between successive batch submissions, milliseconds
    pub pacing_delay_ms: Option<u64>,
}

/// Classifier keyword override section of the TOML config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordsToml {
    pub public_facing: Option<Vec<String>>,
    pub non_public_facing: Option<Vec<String>>,
}

/// Resolve the config file path
///
/// Priority: CLI argument, then `ORGSYNC_CONFIG`, then the platform config
/// directory. Returns `None` when no config file exists anywhere (callers
/// fall back to compiled defaults).
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var("ORGSYNC_CONFIG") {
        return Some(PathBuf::from(path));
    }

    let default = default_config_path()?;
    if default.exists() {
        Some(default)
    } else {
        None
    }
}

/// Default config file path for the platform (`<config dir>/orgsync/orgsync.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("orgsync").join("orgsync.toml"))
}

/// Default data directory for the platform (`<data dir>/orgsync`)
///
/// Checkpoints land here unless overridden.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("orgsync"))
        .unwrap_or_else(|| PathBuf::from("./orgsync_data"))
}

/// Load and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Write a TOML config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    tracing::debug!(path = %path.display(), "Config written");
    Ok(())
}
