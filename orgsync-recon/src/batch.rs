//! Batch accumulation and application
//!
//! Lifecycle per batch: Accumulating -> Submitting -> Committed | Failed.
//! Submission retries up to a fixed budget with a backoff delay; a store
//! that reports row-level failures gets only its failed rows retried. After
//! the budget is exhausted the batch is recorded in the failure list and the
//! run continues: one bad batch never aborts the run. A pacing delay is
//! inserted between successive submissions regardless of outcome.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::models::BatchFailure;
use crate::resolver::{ConflictPolicy, WriteOp};
use crate::store::{BatchOutcome, RegistryStore};

/// Inserts a minimum interval between successive submissions
struct Pacer {
    last_submission: Option<Instant>,
    min_interval: Duration,
}

impl Pacer {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_submission: None,
            min_interval,
        }
    }

    /// Wait if necessary to honor the pacing interval
    async fn wait(&mut self) {
        if let Some(last) = self.last_submission {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Pacing: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }
        self.last_submission = Some(Instant::now());
    }
}

/// Result of one submitted batch
#[derive(Debug)]
pub struct SubmitSummary {
    pub batch_index: u64,
    /// Accumulated counts for rows that committed (possibly across partial
    /// attempts)
    pub outcome: BatchOutcome,
    /// Identifiers whose rows were applied (written or skipped as existing);
    /// these belong in the checkpoint
    pub applied_eins: Vec<String>,
    /// Present when rows remained unapplied after the retry budget
    pub failure: Option<BatchFailure>,
}

impl SubmitSummary {
    pub fn committed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Groups resolved write operations into bounded batches and applies them
pub struct BatchApplier<'a> {
    store: &'a dyn RegistryStore,
    policy: ConflictPolicy,
    batch_size: usize,
    retry_budget: u32,
    retry_backoff: Duration,
    pacer: Pacer,
    pending: Vec<WriteOp>,
    batch_index: u64,
}

impl<'a> BatchApplier<'a> {
    pub fn new(
        store: &'a dyn RegistryStore,
        policy: ConflictPolicy,
        batch_size: usize,
        retry_budget: u32,
        retry_backoff: Duration,
        pacing_delay: Duration,
    ) -> Self {
        Self {
            store,
            policy,
            batch_size: batch_size.max(1),
            retry_budget,
            retry_backoff,
            pacer: Pacer::new(pacing_delay),
            pending: Vec::new(),
            batch_index: 0,
        }
    }

    /// Resume batch numbering after a prior checkpointed run
    pub fn resume_from(&mut self, last_batch: u64) {
        self.batch_index = last_batch;
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Append an operation; submits when the batch reaches its size bound.
    /// Returns the submission summary when a batch boundary was crossed.
    pub async fn push(&mut self, op: WriteOp) -> Option<SubmitSummary> {
        self.pending.push(op);
        if self.pending.len() >= self.batch_size {
            Some(self.submit().await)
        } else {
            None
        }
    }

    /// Submit any partial batch at end of input
    pub async fn flush(&mut self) -> Option<SubmitSummary> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.submit().await)
        }
    }

    async fn submit(&mut self) -> SubmitSummary {
        let ops = std::mem::take(&mut self.pending);
        self.batch_index += 1;
        let batch_index = self.batch_index;

        self.pacer.wait().await;

        tracing::debug!(
            batch = batch_index,
            ops = ops.len(),
            policy = %self.policy,
            "Submitting batch"
        );

        let mut summary = SubmitSummary {
            batch_index,
            outcome: BatchOutcome::default(),
            applied_eins: Vec::new(),
            failure: None,
        };

        let mut remaining = ops;
        let mut attempt: u32 = 0;
        let last_error: String;

        loop {
            match self.store.apply_batch(&remaining, self.policy).await {
                Ok(outcome) => {
                    let failed_rows: HashSet<usize> =
                        outcome.failed_rows.iter().map(|f| f.source_row).collect();

                    summary.outcome.inserted += outcome.inserted;
                    summary.outcome.updated += outcome.updated;
                    summary.outcome.skipped += outcome.skipped;
                    summary.applied_eins.extend(
                        remaining
                            .iter()
                            .filter(|op| !failed_rows.contains(&op.source_row))
                            .map(|op| op.ein.clone()),
                    );

                    if failed_rows.is_empty() {
                        tracing::debug!(batch = batch_index, "Batch committed");
                        return summary;
                    }

                    // Row-level store: retry only the failed rows
                    let error = outcome
                        .failed_rows
                        .first()
                        .map(|f| f.error.clone())
                        .unwrap_or_else(|| "row failure".to_string());
                    remaining.retain(|op| failed_rows.contains(&op.source_row));

                    if attempt >= self.retry_budget {
                        last_error = error;
                        break;
                    }
                    attempt += 1;
                    tracing::warn!(
                        batch = batch_index,
                        attempt,
                        failed_rows = remaining.len(),
                        error = %error,
                        "Partial batch failure, retrying failed rows"
                    );
                }
                Err(e) => {
                    if !e.is_retryable() || attempt >= self.retry_budget {
                        last_error = e.to_string();
                        break;
                    }
                    attempt += 1;
                    tracing::warn!(
                        batch = batch_index,
                        attempt,
                        error = %e,
                        "Batch submission failed, retrying"
                    );
                }
            }

            tokio::time::sleep(self.retry_backoff).await;
        }

        tracing::error!(
            batch = batch_index,
            unapplied = remaining.len(),
            error = %last_error,
            "Batch failed after {} attempts",
            attempt + 1
        );

        summary.failure = Some(BatchFailure {
            batch_index,
            eins: remaining.iter().map(|op| op.ein.clone()).collect(),
            source_rows: remaining.iter().map(|op| op.source_row).collect(),
            error: last_error,
        });
        summary
    }
}
