use serde::Serialize;

use super::{BeneficiaryRecord, FeatureVector, RiskScore, RiskTier};

/// One successfully scored CSV row. `line` is the 1-based line number in the
/// uploaded file, header included.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredRow {
    pub line: u64,
    pub record: BeneficiaryRecord,
    pub features: FeatureVector,
    #[serde(rename = "riskScore")]
    pub score: RiskScore,
    #[serde(rename = "riskLevel")]
    pub tier: RiskTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorKind {
    /// Unreadable or incomplete row.
    Validation,
    /// The gateway failed for this row.
    Scoring,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub line: u64,
    pub kind: RowErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

impl TierCounts {
    pub fn record(&mut self, tier: RiskTier) {
        match tier {
            RiskTier::Low => self.low += 1,
            RiskTier::Medium => self.medium += 1,
            RiskTier::High => self.high += 1,
        }
    }

    pub fn get(&self, tier: RiskTier) -> u64 {
        match tier {
            RiskTier::Low => self.low,
            RiskTier::Medium => self.medium,
            RiskTier::High => self.high,
        }
    }

    pub fn total(&self) -> u64 {
        self.low + self.medium + self.high
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopRisk {
    pub line: u64,
    pub bank_account: String,
    pub mobile: String,
    pub risk_score: RiskScore,
    pub risk_level: RiskTier,
}

impl From<&ScoredRow> for TopRisk {
    fn from(row: &ScoredRow) -> Self {
        Self {
            line: row.line,
            bank_account: row.record.bank_account().to_string(),
            mobile: row.record.mobile().to_string(),
            risk_score: row.score,
            risk_level: row.tier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub rows: Vec<ScoredRow>,
    pub row_errors: Vec<RowError>,
    pub tier_counts: TierCounts,
    /// Score histogram with ten buckets of width 10.
    pub risk_distribution: Vec<u64>,
    pub top_high_risk: Vec<TopRisk>,
    pub financial_leakage: f64,
    pub csv_results: String,
}
