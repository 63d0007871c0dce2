use std::collections::HashMap;
use std::str::FromStr;

use tracing::warn;

use common::config::BatchConfig;

use crate::batch::BatchError;
use crate::model::{BatchResult, RiskScore, RiskTier, RowError, ScoredRow, TierCounts, TopRisk};

pub const HISTOGRAM_BUCKETS: usize = 10;

/// Bucket `i` holds scores in `[10 * i, 10 * (i + 1))`. Scores below zero
/// land in the first bucket; 90 and above, including anything over 100,
/// land in the last.
pub fn histogram_bucket(score: RiskScore) -> usize {
    let bucket = (score / 10.0).floor();
    if bucket.is_nan() || bucket < 0.0 {
        0
    } else if bucket >= (HISTOGRAM_BUCKETS - 1) as f64 {
        HISTOGRAM_BUCKETS - 1
    } else {
        bucket as usize
    }
}

pub fn histogram<I>(scores: I) -> Vec<u64>
where
    I: IntoIterator<Item = RiskScore>,
{
    let mut buckets = vec![0; HISTOGRAM_BUCKETS];
    for score in scores {
        buckets[histogram_bucket(score)] += 1;
    }
    buckets
}

/// The `n` highest-scoring rows, highest first. Rows with equal scores keep
/// their file order.
pub fn top_risks(rows: &[ScoredRow], n: usize) -> Vec<TopRisk> {
    let mut ranked: Vec<&ScoredRow> = rows.iter().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.into_iter().take(n).map(TopRisk::from).collect()
}

/// Estimated amount at risk for a set of scored rows.
pub trait LeakageEstimator: Send + Sync {
    fn estimate(&self, rows: &[ScoredRow]) -> f64;
}

/// Flat amount per record, chosen by tier.
#[derive(Debug, Clone, PartialEq)]
pub struct TierCostLeakage {
    costs: HashMap<RiskTier, f64>,
}

impl TierCostLeakage {
    pub fn new(costs: HashMap<RiskTier, f64>) -> Self {
        Self { costs }
    }

    /// Reads the `leakage_per_record` map; keys are tier names in any case.
    pub fn from_config(config: &BatchConfig) -> Self {
        let mut costs = HashMap::new();
        for (key, cost) in &config.leakage_per_record {
            let tier = RiskTier::ALL
                .into_iter()
                .find(|tier| tier.key().eq_ignore_ascii_case(key))
                .or_else(|| RiskTier::from_str(key).ok());
            match tier {
                Some(tier) => {
                    costs.insert(tier, *cost);
                }
                None => warn!(key = %key, "Ignoring leakage cost for unknown tier"),
            }
        }
        Self { costs }
    }

    pub fn cost_for(&self, tier: RiskTier) -> f64 {
        self.costs.get(&tier).copied().unwrap_or(0.0)
    }
}

impl LeakageEstimator for TierCostLeakage {
    fn estimate(&self, rows: &[ScoredRow]) -> f64 {
        rows.iter().map(|row| self.cost_for(row.tier)).sum()
    }
}

/// `account,mobile,riskScore` per scored row, file order.
pub fn render_csv(rows: &[ScoredRow]) -> Result<String, BatchError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let to_batch_error = |e: csv::Error| BatchError::Csv(e.to_string());

    writer
        .write_record(["account", "mobile", "riskScore"])
        .map_err(to_batch_error)?;
    for row in rows {
        writer
            .write_record([
                row.record.bank_account(),
                row.record.mobile(),
                &row.score.to_string(),
            ])
            .map_err(to_batch_error)?;
    }

    let bytes = writer.into_inner().map_err(|e| BatchError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| BatchError::Csv(e.to_string()))
}

pub fn summarize(
    rows: Vec<ScoredRow>,
    row_errors: Vec<RowError>,
    top_n: usize,
    leakage: &dyn LeakageEstimator,
) -> Result<BatchResult, BatchError> {
    let mut tier_counts = TierCounts::default();
    for row in &rows {
        tier_counts.record(row.tier);
    }

    Ok(BatchResult {
        risk_distribution: histogram(rows.iter().map(|row| row.score)),
        top_high_risk: top_risks(&rows, top_n),
        financial_leakage: leakage.estimate(&rows),
        csv_results: render_csv(&rows)?,
        tier_counts,
        row_errors,
        rows,
    })
}
