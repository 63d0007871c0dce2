use async_trait::async_trait;
use evalexpr::*;

use crate::{
    model::{FeatureVector, GenericError, RiskScore},
    scorers::{DependencyError, ScoringGateway},
};

/// Local stand-in for the remote scorer: a single evalexpr expression over
/// `bank_dup_count`, `mobile_dup_count` and `age_anomaly`.
#[derive(Debug, Clone)]
pub struct ExpressionScoringGateway {
    expression: String,
}

impl ExpressionScoringGateway {
    /// Fails when the expression does not parse.
    pub fn new(expression: impl Into<String>) -> Result<Self, GenericError> {
        let expression = expression.into();
        let _: Node = build_operator_tree(&expression)?;
        Ok(Self { expression })
    }

    fn setup_context(&self, vector: &FeatureVector) -> Result<HashMapContext, DependencyError> {
        let mut context: HashMapContext = HashMapContext::new();
        let variables = [
            ("bank_dup_count", vector.bank_duplicate_count as f64),
            ("mobile_dup_count", vector.mobile_duplicate_count as f64),
            ("age_anomaly", f64::from(vector.age_anomaly)),
        ];
        for (name, value) in variables {
            context
                .set_value(name.to_string(), Value::Float(value))
                .map_err(|e| DependencyError::Expression(e.to_string()))?;
        }
        Ok(context)
    }
}

#[async_trait]
impl ScoringGateway for ExpressionScoringGateway {
    async fn score(&self, vector: &FeatureVector) -> Result<RiskScore, DependencyError> {
        let context = self.setup_context(vector)?;
        let value = eval_with_context(&self.expression, &context)
            .map_err(|e| DependencyError::Expression(e.to_string()))?;

        let score = match value {
            Value::Float(f) => f,
            Value::Int(i) => i as f64,
            other => {
                tracing::warn!("Expression produced non-numeric result: {:?}", other);
                return Err(DependencyError::Expression(format!(
                    "expected a number, got {:?}",
                    other
                )));
            }
        };

        if !score.is_finite() {
            return Err(DependencyError::Expression(format!("score is not finite: {}", score)));
        }
        Ok(score)
    }
}
