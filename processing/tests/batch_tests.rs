mod mocks;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use mocks::{constant_gateway, duplicate_weighted_gateway, evaluator_with, memory_store, MockScoringGatewayService};
use processing::{
    batch::{BatchAnalyzer, BatchError, PipelineBatchEvaluator, TierCostLeakage},
    model::{FeatureVector, RiskScore, RiskTier, RowErrorKind},
    scorers::{DependencyError, ScoringGateway},
    storage::{BlobError, BlobStore},
};

const HEADER: &str = "bankAccount,mobile,age\n";

fn leakage() -> Arc<TierCostLeakage> {
    Arc::new(TierCostLeakage::new(HashMap::from([
        (RiskTier::Low, 500.0),
        (RiskTier::Medium, 2000.0),
        (RiskTier::High, 10000.0),
    ])))
}

async fn pipeline_with(
    gateway: impl ScoringGateway + 'static,
    csv: &str,
    concurrency: usize,
) -> (PipelineBatchEvaluator, String) {
    let store = memory_store();
    let key = store.put("batch.csv", csv.as_bytes().to_vec()).await.unwrap();
    let pipeline = PipelineBatchEvaluator::new(evaluator_with(gateway), store, leakage(), concurrency, 3);
    (pipeline, key)
}

/// Sleeps longer the more duplicates a row has.
struct DuplicateDelayGateway;

#[async_trait]
impl ScoringGateway for DuplicateDelayGateway {
    async fn score(&self, vector: &FeatureVector) -> Result<RiskScore, DependencyError> {
        let delay = 5 * (vector.bank_duplicate_count + vector.mobile_duplicate_count);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(10.0 * vector.bank_duplicate_count as f64)
    }
}

/// Cancels the batch from inside the first scoring call.
struct CancellingGateway {
    token: CancellationToken,
    calls: AtomicUsize,
}

#[async_trait]
impl ScoringGateway for CancellingGateway {
    async fn score(&self, _vector: &FeatureVector) -> Result<RiskScore, DependencyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
        Ok(20.0)
    }
}

#[tokio::test]
async fn rows_sharing_a_bank_account_see_each_other() {
    let csv = format!("{}111,900,30\n111,901,40\n222,902,50\n", HEADER);
    let (pipeline, key) = pipeline_with(duplicate_weighted_gateway(), &csv, 2).await;

    let result = pipeline.evaluate_batch(&key, CancellationToken::new()).await.unwrap();

    assert_eq!(result.rows.len(), 3);
    assert!(result.rows[0].features.bank_duplicate_count >= 2);
    assert!(result.rows[1].features.bank_duplicate_count >= 2);
    assert_eq!(result.rows[2].features.bank_duplicate_count, 1);
    assert_eq!(result.rows[0].score, 25.0);
    assert_eq!(result.rows[2].score, 0.0);
}

#[tokio::test]
async fn shared_mobile_numbers_are_counted_too() {
    let csv = format!("{}111,900,30\n222,900,40\n333,900,150\n", HEADER);
    let (pipeline, key) = pipeline_with(duplicate_weighted_gateway(), &csv, 4).await;

    let result = pipeline.evaluate_batch(&key, CancellationToken::new()).await.unwrap();

    assert!(result.rows.iter().all(|row| row.features.mobile_duplicate_count == 3));
    assert_eq!(result.rows[2].features.age_anomaly, 1);
    assert_eq!(result.rows[2].tier, RiskTier::High);
    assert_eq!(result.rows[0].tier, RiskTier::Medium);
}

#[tokio::test]
async fn output_keeps_file_order_under_concurrency() {
    let mut csv = HEADER.to_string();
    for i in 0..12 {
        // Earlier rows carry more duplicates and therefore sleep longer.
        let bank = if i < 6 { "111".to_string() } else { format!("9{}", i) };
        csv.push_str(&format!("{},80{},{}\n", bank, i, 20 + i));
    }
    let (pipeline, key) = pipeline_with(DuplicateDelayGateway, &csv, 8).await;

    let result = pipeline.evaluate_batch(&key, CancellationToken::new()).await.unwrap();

    let lines: Vec<u64> = result.rows.iter().map(|row| row.line).collect();
    assert_eq!(lines, (2..14).collect::<Vec<u64>>());
}

#[tokio::test]
async fn invalid_rows_become_row_errors_with_line_numbers() {
    let csv = format!("{}111,900,30\n,901,40\n222,,abc\n333,903,41\n", HEADER);
    let (pipeline, key) = pipeline_with(constant_gateway(45.0), &csv, 2).await;

    let result = pipeline.evaluate_batch(&key, CancellationToken::new()).await.unwrap();

    let scored: Vec<u64> = result.rows.iter().map(|row| row.line).collect();
    assert_eq!(scored, vec![2, 5]);
    let errors: Vec<(u64, RowErrorKind)> = result.row_errors.iter().map(|e| (e.line, e.kind)).collect();
    assert_eq!(errors, vec![(3, RowErrorKind::Validation), (4, RowErrorKind::Validation)]);
    assert!(result.row_errors[1].message.contains("mobile"));
}

#[tokio::test]
async fn partial_gateway_failure_is_reported_per_row() {
    let mut gateway = MockScoringGatewayService::new();
    gateway.expect_score().returning(|v| {
        if v.age_anomaly == 1 {
            Err(DependencyError::UnexpectedStatus(500))
        } else {
            Ok(80.0)
        }
    });
    let csv = format!("{}111,900,30\n222,901,120\n333,902,40\n", HEADER);
    let (pipeline, key) = pipeline_with(gateway, &csv, 2).await;

    let result = pipeline.evaluate_batch(&key, CancellationToken::new()).await.unwrap();

    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.row_errors.len(), 1);
    assert_eq!(result.row_errors[0].line, 3);
    assert_eq!(result.row_errors[0].kind, RowErrorKind::Scoring);
    assert_eq!(result.tier_counts.high, 2);
}

#[tokio::test]
async fn batch_fails_when_every_row_fails_scoring() {
    let mut gateway = MockScoringGatewayService::new();
    gateway
        .expect_score()
        .times(2)
        .returning(|_| Err(DependencyError::Unreachable("connection refused".to_string())));
    let csv = format!("{}111,900,30\n222,901,40\n", HEADER);
    let (pipeline, key) = pipeline_with(gateway, &csv, 2).await;

    let result = pipeline.evaluate_batch(&key, CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(BatchError::Dependency(DependencyError::Unreachable(_)))
    ));
}

#[tokio::test]
async fn file_of_only_invalid_rows_is_not_a_dependency_failure() {
    let mut gateway = MockScoringGatewayService::new();
    gateway.expect_score().never();
    let csv = format!("{},900,30\n", HEADER);
    let (pipeline, key) = pipeline_with(gateway, &csv, 2).await;

    let result = pipeline.evaluate_batch(&key, CancellationToken::new()).await.unwrap();

    assert!(result.rows.is_empty());
    assert_eq!(result.row_errors.len(), 1);
    assert_eq!(result.csv_results, "account,mobile,riskScore\n");
    assert_eq!(result.financial_leakage, 0.0);
}

#[tokio::test]
async fn cancelled_token_stops_before_any_scoring() {
    let mut gateway = MockScoringGatewayService::new();
    gateway.expect_score().never();
    let csv = format!("{}111,900,30\n222,901,40\n", HEADER);
    let (pipeline, key) = pipeline_with(gateway, &csv, 2).await;

    let token = CancellationToken::new();
    token.cancel();
    let result = pipeline.evaluate_batch(&key, token).await;

    assert!(matches!(result, Err(BatchError::Cancelled { completed: 0, total: 2 })));
}

#[tokio::test]
async fn cancellation_mid_batch_stops_remaining_rows() {
    let token = CancellationToken::new();
    let gateway = Arc::new(CancellingGateway {
        token: token.clone(),
        calls: AtomicUsize::new(0),
    });
    let store = memory_store();
    let csv = format!("{}111,900,30\n222,901,40\n333,902,50\n", HEADER);
    let key = store.put("batch.csv", csv.into_bytes()).await.unwrap();
    let evaluator = processing::evaluator::Evaluator::new(
        gateway.clone(),
        Arc::new(processing::features::FixedDuplicateCounts::default()),
    );
    let pipeline = PipelineBatchEvaluator::new(evaluator, store, leakage(), 1, 3);

    let result = pipeline.evaluate_batch(&key, token).await;

    assert!(matches!(result, Err(BatchError::Cancelled { completed: 1, total: 3 })));
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_key_is_a_blob_error() {
    let (pipeline, _) = pipeline_with(constant_gateway(1.0), HEADER, 1).await;

    let result = pipeline.evaluate_batch("uploads/1-nope.csv", CancellationToken::new()).await;

    assert!(matches!(result, Err(BatchError::Blob(BlobError::NotFound(_)))));
}

#[tokio::test]
async fn file_without_required_columns_is_rejected() {
    let (pipeline, key) = pipeline_with(constant_gateway(1.0), "name,phone\nA,900\n", 1).await;

    let result = pipeline.evaluate_batch(&key, CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(BatchError::MissingColumns(ref columns)) if columns == &vec!["bankAccount", "age"]
    ));
}

#[tokio::test]
async fn summary_covers_tiers_top_risks_and_leakage() {
    let mut gateway = MockScoringGatewayService::new();
    gateway
        .expect_score()
        .returning(|v| Ok(if v.age_anomaly == 1 { 95.0 } else { 30.0 }));
    let csv = format!(
        "{}111,900,101\n222,901,20\n333,902,105\n444,903,25\n555,904,110\n666,905,102\n",
        HEADER
    );
    let (pipeline, key) = pipeline_with(gateway, &csv, 3).await;

    let result = pipeline.evaluate_batch(&key, CancellationToken::new()).await.unwrap();

    assert_eq!(result.tier_counts.high, 4);
    assert_eq!(result.tier_counts.low, 2);
    assert_eq!(result.tier_counts.total(), result.rows.len() as u64);
    assert_eq!(result.risk_distribution[9], 4);
    assert_eq!(result.risk_distribution[3], 2);
    assert_eq!(result.risk_distribution.iter().sum::<u64>(), 6);

    let top: Vec<u64> = result.top_high_risk.iter().map(|t| t.line).collect();
    assert_eq!(top, vec![2, 4, 6]);
    assert_eq!(result.financial_leakage, 4.0 * 10000.0 + 2.0 * 500.0);
    assert!(result.csv_results.starts_with("account,mobile,riskScore\n111,900,95\n"));
}
