use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info, warn};

use crate::{
    classifier::classify,
    features::{derive, DuplicateCountLookup},
    model::{BeneficiaryRecord, Evaluation, RawBeneficiaryRecord, ValidationError},
    scorers::{DependencyError, ScoringGateway},
};

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

/// Validate, derive features, score and classify one beneficiary.
#[derive(Clone)]
pub struct Evaluator {
    gateway: Arc<dyn ScoringGateway>,
    duplicates: Arc<dyn DuplicateCountLookup>,
}

impl Evaluator {
    pub fn new(gateway: Arc<dyn ScoringGateway>, duplicates: Arc<dyn DuplicateCountLookup>) -> Self {
        info!("Initializing new Evaluator");
        Self { gateway, duplicates }
    }

    /// Validation runs before anything else; an invalid record never reaches
    /// the gateway.
    pub async fn evaluate_one(&self, raw: &RawBeneficiaryRecord) -> Result<Evaluation, EvaluationError> {
        let record = raw.validate().inspect_err(|e| {
            warn!(error = %e, "Rejected single-check record");
        })?;

        let evaluation = self.evaluate_record(&record, self.duplicates.as_ref()).await?;
        counter!("portal_evaluations_total", "tier" => evaluation.tier.key(), "source" => "single").increment(1);
        info!(score = evaluation.score, tier = %evaluation.tier, "Evaluated single record");
        Ok(evaluation)
    }

    /// Scores an already validated record against the given duplicate context.
    pub async fn evaluate_record(
        &self,
        record: &BeneficiaryRecord,
        duplicates: &dyn DuplicateCountLookup,
    ) -> Result<Evaluation, DependencyError> {
        let counts = duplicates.counts_for(record);
        let features = derive(record, counts);
        debug!(?features, "Derived feature vector");

        let score = self.gateway.score(&features).await?;
        Ok(Evaluation {
            features,
            score,
            tier: classify(score),
        })
    }
}
