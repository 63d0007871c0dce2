pub mod expression_based;
pub mod http_gateway;
pub mod retry;

pub use expression_based::ExpressionScoringGateway;
pub use http_gateway::HttpScoringGateway;
pub use retry::RetryPolicy;

use crate::model::{FeatureVector, RiskScore};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DependencyError {
    #[error("scoring gateway unreachable: {0}")]
    Unreachable(String),

    #[error("scoring gateway timed out after {0:?}")]
    Timeout(Duration),

    #[error("scoring gateway responded with status {0}")]
    UnexpectedStatus(u16),

    #[error("scoring gateway returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("scoring expression failed: {0}")]
    Expression(String),
}

impl DependencyError {
    /// Failures worth retrying: the next attempt may succeed unchanged.
    pub fn is_transient(&self) -> bool {
        match self {
            DependencyError::Unreachable(_) | DependencyError::Timeout(_) => true,
            DependencyError::UnexpectedStatus(status) => *status == 429 || (500..=599).contains(status),
            DependencyError::MalformedResponse(_) | DependencyError::Expression(_) => false,
        }
    }

    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            DependencyError::Unreachable(_) => "unreachable",
            DependencyError::Timeout(_) => "timeout",
            DependencyError::UnexpectedStatus(_) => "status",
            DependencyError::MalformedResponse(_) => "malformed",
            DependencyError::Expression(_) => "expression",
        }
    }
}

/// Opaque scoring oracle: feature vector in, score out.
#[async_trait]
pub trait ScoringGateway: Send + Sync {
    async fn score(&self, vector: &FeatureVector) -> Result<RiskScore, DependencyError>;
}
