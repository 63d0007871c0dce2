use serde::{Deserialize, Serialize};
use std::error::Error;
use strum_macros::{Display as EnumDisplay, EnumString};

pub mod batch;
pub mod record;

pub use batch::{BatchResult, RowError, RowErrorKind, ScoredRow, TierCounts, TopRisk};
pub use record::{BeneficiaryRecord, RawAge, RawBeneficiaryRecord, ValidationError};

/// Score returned by the scoring gateway. Nominally within [0, 100] but
/// nothing downstream relies on that bound.
pub type RiskScore = f64;

pub type GenericError = Box<dyn Error + Send + Sync>;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumDisplay, EnumString,
)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub const ALL: [RiskTier; 3] = [RiskTier::Low, RiskTier::Medium, RiskTier::High];

    /// Lowercase key used in configuration maps and metric labels.
    pub fn key(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

/// Input of the scoring gateway.
///
/// Field order and wire names are part of the gateway contract; adding a
/// field is a breaking change on the gateway side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureVector {
    #[serde(rename = "bank_dup_count")]
    pub bank_duplicate_count: u64,
    #[serde(rename = "mobile_dup_count")]
    pub mobile_duplicate_count: u64,
    /// 1 when the beneficiary is older than 100, otherwise 0.
    pub age_anomaly: u8,
}

/// Outcome of evaluating one record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub features: FeatureVector,
    pub score: RiskScore,
    pub tier: RiskTier,
}
