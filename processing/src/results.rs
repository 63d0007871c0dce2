use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::batch::summary::{histogram_bucket, HISTOGRAM_BUCKETS};
use crate::model::{BatchResult, Evaluation, RiskTier, TierCounts};

/// Aggregate view served by the results dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsSummary {
    pub total: u64,
    pub high_risk_percent: f64,
    pub medium_risk_percent: f64,
    pub low_risk_percent: f64,
    pub histogram: Vec<u64>,
    pub financial_leakage: f64,
    pub batches: u64,
}

#[derive(Debug, Default)]
struct LedgerState {
    tiers: TierCounts,
    histogram: [u64; HISTOGRAM_BUCKETS],
    leakage: f64,
    batches: u64,
}

/// Running totals over every evaluation since startup.
#[derive(Debug, Default)]
pub struct ResultsLedger {
    state: Mutex<LedgerState>,
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 * 1000.0 / total as f64).round() / 10.0
}

impl ResultsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_single(&self, evaluation: &Evaluation) {
        let mut state = self.lock();
        state.tiers.record(evaluation.tier);
        state.histogram[histogram_bucket(evaluation.score)] += 1;
    }

    pub fn record_batch(&self, result: &BatchResult) {
        let mut state = self.lock();
        for row in &result.rows {
            state.tiers.record(row.tier);
            state.histogram[histogram_bucket(row.score)] += 1;
        }
        state.leakage += result.financial_leakage;
        state.batches += 1;
    }

    pub fn summary(&self) -> ResultsSummary {
        let state = self.lock();
        let total = state.tiers.total();
        ResultsSummary {
            total,
            high_risk_percent: percent(state.tiers.get(RiskTier::High), total),
            medium_risk_percent: percent(state.tiers.get(RiskTier::Medium), total),
            low_risk_percent: percent(state.tiers.get(RiskTier::Low), total),
            histogram: state.histogram.to_vec(),
            financial_leakage: state.leakage,
            batches: state.batches,
        }
    }
}
