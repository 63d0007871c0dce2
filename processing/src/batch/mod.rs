pub mod rows;
pub mod summary;

pub use summary::{LeakageEstimator, TierCostLeakage};

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use common::config::BatchConfig;

use crate::evaluator::Evaluator;
use crate::features::BatchDuplicateIndex;
use crate::model::{BatchResult, RowError, RowErrorKind, ScoredRow};
use crate::scorers::DependencyError;
use crate::storage::{BlobError, BlobStore};

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error("unreadable CSV: {0}")]
    Csv(String),

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),

    #[error("batch cancelled after {completed} of {total} rows")]
    Cancelled { completed: usize, total: usize },

    #[error("scoring failed for every row: {0}")]
    Dependency(DependencyError),
}

/// Evaluates a stored CSV upload.
#[async_trait]
pub trait BatchAnalyzer: Send + Sync {
    async fn evaluate_batch(&self, key: &str, cancel: CancellationToken) -> Result<BatchResult, BatchError>;
}

/// Two-phase batch: every row is validated and indexed for duplicates before
/// any row is scored, so each row sees the duplicate counts of the whole file.
pub struct PipelineBatchEvaluator {
    evaluator: Evaluator,
    blob_store: Arc<dyn BlobStore>,
    leakage: Arc<dyn LeakageEstimator>,
    concurrency: usize,
    top_n: usize,
}

impl PipelineBatchEvaluator {
    pub fn new(
        evaluator: Evaluator,
        blob_store: Arc<dyn BlobStore>,
        leakage: Arc<dyn LeakageEstimator>,
        concurrency: usize,
        top_n: usize,
    ) -> Self {
        Self {
            evaluator,
            blob_store,
            leakage,
            concurrency: concurrency.max(1),
            top_n,
        }
    }

    pub fn from_config(
        evaluator: Evaluator,
        blob_store: Arc<dyn BlobStore>,
        leakage: Arc<dyn LeakageEstimator>,
        config: &BatchConfig,
    ) -> Self {
        Self::new(evaluator, blob_store, leakage, config.concurrency, config.top_n)
    }

    /// Runs the pipeline over CSV bytes already in hand.
    pub async fn evaluate_bytes(&self, bytes: &[u8], cancel: &CancellationToken) -> Result<BatchResult, BatchError> {
        let (valid, mut row_errors) = rows::validated_rows(bytes)?;
        let rejected = row_errors.len();
        let index = BatchDuplicateIndex::build(valid.iter().map(|(_, record)| record));
        let total = valid.len();
        debug!(valid = total, rejected, "Batch validation finished");

        let index = &index;
        let outcomes: Vec<_> = stream::iter(valid)
            .map(|(line, record)| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let outcome = self.evaluator.evaluate_record(&record, index).await;
                Some((line, record, outcome))
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let completed = outcomes.iter().filter(|outcome| outcome.is_some()).count();
        if completed < total {
            warn!(completed, total, "Batch cancelled");
            return Err(BatchError::Cancelled { completed, total });
        }

        let mut scored = Vec::with_capacity(total);
        let mut first_failure = None;
        for (line, record, outcome) in outcomes.into_iter().flatten() {
            match outcome {
                Ok(evaluation) => {
                    counter!("portal_evaluations_total", "tier" => evaluation.tier.key(), "source" => "batch")
                        .increment(1);
                    scored.push(ScoredRow {
                        line,
                        record,
                        features: evaluation.features,
                        score: evaluation.score,
                        tier: evaluation.tier,
                    });
                }
                Err(e) => {
                    row_errors.push(RowError {
                        line,
                        kind: RowErrorKind::Scoring,
                        message: e.to_string(),
                    });
                    first_failure.get_or_insert(e);
                }
            }
        }

        let failed = total - scored.len();
        counter!("portal_batch_rows_total", "outcome" => "scored").increment(scored.len() as u64);
        counter!("portal_batch_rows_total", "outcome" => "rejected").increment(rejected as u64);
        counter!("portal_batch_rows_total", "outcome" => "failed").increment(failed as u64);

        if let Some(e) = first_failure.filter(|_| scored.is_empty()) {
            error!(error = %e, rows = total, "Scoring failed for the whole batch");
            return Err(BatchError::Dependency(e));
        }

        row_errors.sort_by_key(|e| e.line);
        let result = summary::summarize(scored, row_errors, self.top_n, self.leakage.as_ref())?;
        info!(
            scored = result.rows.len(),
            row_errors = result.row_errors.len(),
            high = result.tier_counts.high,
            "Batch evaluated"
        );
        Ok(result)
    }
}

#[async_trait]
impl BatchAnalyzer for PipelineBatchEvaluator {
    async fn evaluate_batch(&self, key: &str, cancel: CancellationToken) -> Result<BatchResult, BatchError> {
        let bytes = self.blob_store.get(key).await?;
        info!(key = %key, size = bytes.len(), "Evaluating batch");
        self.evaluate_bytes(&bytes, &cancel).await
    }
}
