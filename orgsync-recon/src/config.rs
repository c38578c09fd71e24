//! Run configuration resolution
//!
//! Tuning values resolve environment variable first, then the TOML config
//! file, then the compiled default. Policy and field scope are per-run
//! choices made by the caller, not ambient configuration.

use std::str::FromStr;
use std::time::Duration;

use orgsync_common::config::EngineToml;
use tracing::warn;

use crate::resolver::{ConflictPolicy, FieldScope};

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_RETRY_BUDGET: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
pub const DEFAULT_PACING_DELAY_MS: u64 = 1000;

/// Explicit configuration object passed to the pipeline at construction;
/// there is no process-wide mutable state
#[derive(Debug, Clone)]
pub struct ReconConfig {
    /// Operations per batch
    pub batch_size: usize,
    /// Submission attempts per batch beyond the first
    pub retry_budget: u32,
    /// Delay between retry attempts
    pub retry_backoff: Duration,
    /// Pacing delay between successive batch submissions
    pub pacing_delay: Duration,
    /// Conflict policy for this run
    pub policy: ConflictPolicy,
    /// Update allow-list for this run
    pub scope: FieldScope,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retry_budget: DEFAULT_RETRY_BUDGET,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            pacing_delay: Duration::from_millis(DEFAULT_PACING_DELAY_MS),
            policy: ConflictPolicy::Merge,
            scope: FieldScope::Full,
        }
    }
}

impl ReconConfig {
    /// Resolve tuning values with ENV -> TOML -> default priority
    pub fn resolve(toml: &EngineToml) -> Self {
        Self {
            batch_size: resolve_value("ORGSYNC_BATCH_SIZE", toml.batch_size, DEFAULT_BATCH_SIZE),
            retry_budget: resolve_value(
                "ORGSYNC_RETRY_BUDGET",
                toml.retry_budget,
                DEFAULT_RETRY_BUDGET,
            ),
            retry_backoff: Duration::from_millis(resolve_value(
                "ORGSYNC_RETRY_BACKOFF_MS",
                toml.retry_backoff_ms,
                DEFAULT_RETRY_BACKOFF_MS,
            )),
            pacing_delay: Duration::from_millis(resolve_value(
                "ORGSYNC_PACING_DELAY_MS",
                toml.pacing_delay_ms,
                DEFAULT_PACING_DELAY_MS,
            )),
            policy: ConflictPolicy::Merge,
            scope: FieldScope::Full,
        }
    }
}

/// ENV -> TOML -> default, warning when multiple sources disagree
fn resolve_value<T>(env_name: &str, toml_value: Option<T>, default: T) -> T
where
    T: FromStr + Copy + PartialEq + std::fmt::Display,
{
    let env_value = std::env::var(env_name).ok().and_then(|raw| match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparseable {}={:?}", env_name, raw);
            None
        }
    });

    match (env_value, toml_value) {
        (Some(env), Some(toml)) => {
            if env != toml {
                warn!(
                    "{} set in both environment ({}) and config file ({}); using environment",
                    env_name, env, toml
                );
            }
            env
        }
        (Some(env), None) => env,
        (None, Some(toml)) => toml,
        (None, None) => default,
    }
}
