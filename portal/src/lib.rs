//! Builds the portal's components from a loaded [`Config`].

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use common::config::{BlobStoreConfig, BlobStoreKind, Config, DuplicatesConfig, GatewayConfig, GatewayKind};
use processing::{
    api::AppState,
    auth::Authenticator,
    batch::{rows::validated_rows, LeakageEstimator, PipelineBatchEvaluator, TierCostLeakage},
    evaluator::Evaluator,
    features::{DuplicateCountLookup, DuplicateCounts, FixedDuplicateCounts, IdentifierCounts, ReferenceDuplicateIndex},
    model::GenericError,
    results::ResultsLedger,
    scorers::{ExpressionScoringGateway, HttpScoringGateway, ScoringGateway},
    storage::{BlobStore, FsBlobStore, InMemoryBlobStore},
};

pub fn build_gateway(config: &GatewayConfig) -> Result<Arc<dyn ScoringGateway>, GenericError> {
    match config.kind {
        GatewayKind::Http => {
            let gateway = HttpScoringGateway::from_config(config)?;
            info!(url = %gateway.url(), "Using HTTP scoring gateway");
            Ok(Arc::new(gateway))
        }
        GatewayKind::Expression => {
            info!(expression = %config.expression, "Using expression scoring gateway");
            Ok(Arc::new(ExpressionScoringGateway::new(config.expression.clone())?))
        }
    }
}

pub async fn build_blob_store(config: &BlobStoreConfig) -> Result<Arc<dyn BlobStore>, GenericError> {
    Ok(match config.kind {
        BlobStoreKind::Memory => Arc::new(InMemoryBlobStore::new()),
        BlobStoreKind::Filesystem => Arc::new(FsBlobStore::new(&config.root_dir).await?),
    })
}

/// Reference data when a CSV is configured, otherwise the fixed default
/// counts.
pub async fn build_duplicate_lookup(config: &DuplicatesConfig) -> Result<Arc<dyn DuplicateCountLookup>, GenericError> {
    let Some(path) = &config.reference_csv else {
        return Ok(Arc::new(FixedDuplicateCounts(DuplicateCounts {
            bank: config.default_bank_count,
            mobile: config.default_mobile_count,
        })));
    };

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("failed to read reference data {}: {}", path.display(), e))?;
    let (records, rejected) = validated_rows(&bytes)?;
    if !rejected.is_empty() {
        warn!(rejected = rejected.len(), path = %path.display(), "Skipped invalid reference rows");
    }

    let index = ReferenceDuplicateIndex::new(IdentifierCounts::from_records(records.iter().map(|(_, r)| r)));
    info!(records = index.reference_size(), path = %path.display(), "Loaded duplicate reference data");
    Ok(Arc::new(index))
}

pub async fn build_evaluator(config: &Config) -> Result<Evaluator, GenericError> {
    let gateway = build_gateway(&config.gateway)?;
    let duplicates = build_duplicate_lookup(&config.duplicates).await?;
    Ok(Evaluator::new(gateway, duplicates))
}

pub async fn build_app_state(config: &Config, metrics: Option<PrometheusHandle>) -> Result<AppState, GenericError> {
    let evaluator = build_evaluator(config).await?;
    let blob_store = build_blob_store(&config.blob_store).await?;
    let leakage: Arc<dyn LeakageEstimator> = Arc::new(TierCostLeakage::from_config(&config.batch));
    let batch = PipelineBatchEvaluator::from_config(evaluator.clone(), blob_store.clone(), leakage, &config.batch);

    Ok(AppState {
        evaluator,
        batch: Arc::new(batch),
        blob_store,
        auth: Arc::new(Authenticator::from_config(&config.auth)),
        ledger: Arc::new(ResultsLedger::new()),
        shutdown: CancellationToken::new(),
        metrics,
    })
}
