#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;
use tokio_util::sync::CancellationToken;

use processing::{
    api::AppState,
    auth::Authenticator,
    batch::{BatchAnalyzer, BatchError},
    evaluator::Evaluator,
    features::FixedDuplicateCounts,
    model::{BatchResult, FeatureVector, RawAge, RawBeneficiaryRecord, RiskScore},
    results::ResultsLedger,
    scorers::{DependencyError, ScoringGateway},
    storage::{BlobError, BlobStore, InMemoryBlobStore},
};

mock! {
    pub ScoringGatewayService {}

    #[async_trait]
    impl ScoringGateway for ScoringGatewayService {
        async fn score(&self, vector: &FeatureVector) -> Result<RiskScore, DependencyError>;
    }
}

mock! {
    pub BlobStoreService {}

    #[async_trait]
    impl BlobStore for BlobStoreService {
        async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<String, BlobError>;
        async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError>;
    }
}

mock! {
    pub BatchAnalyzerService {}

    #[async_trait]
    impl BatchAnalyzer for BatchAnalyzerService {
        async fn evaluate_batch(&self, key: &str, cancel: CancellationToken) -> Result<BatchResult, BatchError>;
    }
}

pub const TEST_SECRET: &str = "test-secret";

/// Gateway stub returning the same score for every vector.
pub fn constant_gateway(score: RiskScore) -> MockScoringGatewayService {
    let mut gateway = MockScoringGatewayService::new();
    gateway.expect_score().returning(move |_| Ok(score));
    gateway
}

/// Gateway stub scoring 25 points per duplicate beyond the first, plus 50
/// for an age anomaly.
pub fn duplicate_weighted_gateway() -> MockScoringGatewayService {
    let mut gateway = MockScoringGatewayService::new();
    gateway.expect_score().returning(|v| {
        let score = 25.0 * (v.bank_duplicate_count as f64 - 1.0)
            + 25.0 * (v.mobile_duplicate_count as f64 - 1.0)
            + 50.0 * f64::from(v.age_anomaly);
        Ok(score.min(100.0))
    });
    gateway
}

pub fn evaluator_with(gateway: impl ScoringGateway + 'static) -> Evaluator {
    Evaluator::new(Arc::new(gateway), Arc::new(FixedDuplicateCounts::default()))
}

pub fn raw_record(bank: Option<&str>, mobile: Option<&str>, age: Option<i64>) -> RawBeneficiaryRecord {
    RawBeneficiaryRecord {
        bank_account: bank.map(str::to_string),
        mobile: mobile.map(str::to_string),
        age: age.map(RawAge::Integer),
        scheme_id: None,
    }
}

pub fn authenticator() -> Arc<Authenticator> {
    Arc::new(Authenticator::new("gov", "pass", TEST_SECRET, 60))
}

pub fn app_state(evaluator: Evaluator, batch: Arc<dyn BatchAnalyzer>, blob_store: Arc<dyn BlobStore>) -> AppState {
    AppState {
        evaluator,
        batch,
        blob_store,
        auth: authenticator(),
        ledger: Arc::new(ResultsLedger::new()),
        shutdown: CancellationToken::new(),
        metrics: None,
    }
}

pub fn memory_store() -> Arc<InMemoryBlobStore> {
    Arc::new(InMemoryBlobStore::new())
}
