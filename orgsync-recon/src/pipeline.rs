//! Reconciliation pipeline
//!
//! Orchestrates one run: stream candidates -> normalize -> classify ->
//! match -> resolve -> batch -> apply -> report. Processing is strictly
//! sequential; deterministic last-write-wins resolution requires a total
//! order over operations, and the store front end throttles anyway.
//! Cancellation is honored at batch boundaries only, and the checkpoint is
//! persisted before exit so a re-run resumes instead of reprocessing.

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::batch::{BatchApplier, SubmitSummary};
use crate::checkpoint::Checkpoint;
use crate::classify::Classifier;
use crate::config::ReconConfig;
use crate::error::{ReconError, ReconResult};
use crate::matcher::Matcher;
use crate::models::{ReviewEntry, ReviewReason, RunReport};
use crate::normalize::normalize_candidate;
use crate::resolver::{ConflictResolver, Resolution};
use crate::source::CandidateSource;
use crate::store::RegistryStore;

/// One reconciliation run over one candidate source
pub struct ReconciliationPipeline<'a> {
    store: &'a dyn RegistryStore,
    config: ReconConfig,
    classifier: Classifier,
    checkpoint: Checkpoint,
    cancel: CancellationToken,
}

impl<'a> ReconciliationPipeline<'a> {
    pub fn new(
        store: &'a dyn RegistryStore,
        config: ReconConfig,
        classifier: Classifier,
        checkpoint: Checkpoint,
    ) -> Self {
        Self {
            store,
            config,
            classifier,
            checkpoint,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach an external cancellation token (Ctrl-C handling lives in the
    /// caller)
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the pipeline to completion (or cancellation)
    pub async fn run(mut self, source: &dyn CandidateSource) -> ReconResult<RunReport> {
        let mut report = RunReport::new(source.name().to_string());

        info!(
            run_id = %report.run_id,
            source = source.name(),
            policy = %self.config.policy,
            scope = %self.config.scope,
            batch_size = self.config.batch_size,
            resuming_from = self.checkpoint.state().applied.len(),
            "Starting reconciliation run"
        );

        // Fatal configuration check: abort before any batch is attempted
        self.store
            .ping()
            .await
            .map_err(|e| ReconError::Config(format!("Store unreachable at startup: {}", e)))?;

        let matcher = Matcher::new(self.store);
        let resolver = ConflictResolver::new(self.config.scope);
        let mut applier = BatchApplier::new(
            self.store,
            self.config.policy,
            self.config.batch_size,
            self.config.retry_budget,
            self.config.retry_backoff,
            self.config.pacing_delay,
        );
        applier.resume_from(self.checkpoint.state().last_batch);

        for item in source.candidates()? {
            if self.cancel.is_cancelled() {
                info!("Cancellation requested; stopping at batch boundary");
                report.cancelled = true;
                break;
            }

            report.total_seen += 1;

            let raw = match item {
                Ok(candidate) => candidate,
                Err(e) => {
                    report.review.push(ReviewEntry {
                        source_row: (report.total_seen - 1) as usize,
                        name: String::new(),
                        reason: ReviewReason::SourceError(e.to_string()),
                    });
                    continue;
                }
            };

            let mut candidate = normalize_candidate(&raw);

            // Already applied by a previous batch or run
            if let Some(ein) = &candidate.ein {
                if self.checkpoint.contains(ein) {
                    report.skipped_duplicate += 1;
                    continue;
                }
            }

            if candidate.ein_was_malformed {
                report.invalid_identifier += 1;
                report.review.push(ReviewEntry {
                    source_row: candidate.source_row,
                    name: candidate.name.clone(),
                    reason: ReviewReason::MalformedIdentifier(
                        raw.ein.clone().unwrap_or_default(),
                    ),
                });
                continue;
            }

            let outcome = match matcher.resolve(&candidate).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    report.review.push(ReviewEntry {
                        source_row: candidate.source_row,
                        name: candidate.name.clone(),
                        reason: ReviewReason::LookupFailed(e.to_string()),
                    });
                    continue;
                }
            };
            if outcome.record().is_some() {
                report.matched += 1;
            }

            // Heuristic classification only when neither the candidate nor
            // the canonical record carries an authoritative value
            if candidate.public_facing.is_none() {
                let already_classified = outcome
                    .record()
                    .map(|record| record.public_facing.is_some())
                    .unwrap_or(false);
                if !already_classified {
                    candidate.public_facing = Some(self.classifier.classify(&candidate.name));
                }
            }

            match resolver.resolve(&candidate, outcome.record(), self.config.policy) {
                Resolution::Write(op) => {
                    if let Some(summary) = applier.push(op).await {
                        self.absorb(summary, &mut report)?;
                    }
                }
                Resolution::SkipDuplicate => report.skipped_duplicate += 1,
                Resolution::Review(reason) => report.review.push(ReviewEntry {
                    source_row: candidate.source_row,
                    name: candidate.name.clone(),
                    reason,
                }),
            }
        }

        if !report.cancelled {
            if let Some(summary) = applier.flush().await {
                self.absorb(summary, &mut report)?;
            }
        }

        // Persist before exit so the next run resumes
        self.checkpoint.save()?;
        report.finished_at = Some(Utc::now());

        info!(
            run_id = %report.run_id,
            total_seen = report.total_seen,
            inserted = report.inserted,
            updated = report.updated,
            skipped_duplicate = report.skipped_duplicate,
            failed = report.failed,
            review = report.review.len(),
            cancelled = report.cancelled,
            "Reconciliation run finished"
        );

        Ok(report)
    }

    /// Fold one submitted batch into the report and checkpoint
    fn absorb(&mut self, summary: SubmitSummary, report: &mut RunReport) -> ReconResult<()> {
        report.inserted += summary.outcome.inserted;
        report.updated += summary.outcome.updated;
        report.skipped_duplicate += summary.outcome.skipped;

        if summary.committed() {
            report.batches_committed += 1;
        } else {
            report.batches_failed += 1;
        }

        self.checkpoint
            .record_batch(summary.applied_eins, summary.batch_index);

        if let Some(failure) = summary.failure {
            report.failed += failure.source_rows.len() as u64;
            report.failures.push(failure);
        }

        self.checkpoint.save()?;
        Ok(())
    }
}
