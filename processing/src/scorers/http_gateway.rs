use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::config::GatewayConfig;
use metrics::{counter, histogram};
use serde::Deserialize;
use tracing::{debug, error};
use url::Url;

use crate::model::{FeatureVector, GenericError, RiskScore};
use crate::scorers::{DependencyError, RetryPolicy, ScoringGateway};

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    risk_score: f64,
}

/// Scoring gateway reached over HTTP: `POST {url}` with the feature vector
/// as JSON, `{"risk_score": n}` back.
#[derive(Debug, Clone)]
pub struct HttpScoringGateway {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpScoringGateway {
    pub fn new(url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, GenericError> {
        let url = Url::parse(url)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            timeout,
            retry,
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, GenericError> {
        let url = config.url.as_deref().ok_or("gateway.url is not configured")?;
        Self::new(
            url,
            Duration::from_millis(config.timeout_ms),
            RetryPolicy::new(config.max_retries, Duration::from_millis(config.retry_backoff_ms)),
        )
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn score_once(&self, vector: &FeatureVector) -> Result<RiskScore, DependencyError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(vector)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DependencyError::UnexpectedStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        let parsed: GatewayResponse =
            serde_json::from_str(&body).map_err(|e| DependencyError::MalformedResponse(e.to_string()))?;

        if !parsed.risk_score.is_finite() {
            return Err(DependencyError::MalformedResponse(format!(
                "risk_score is not finite: {}",
                parsed.risk_score
            )));
        }
        Ok(parsed.risk_score)
    }

    fn transport_error(&self, err: reqwest::Error) -> DependencyError {
        if err.is_timeout() {
            DependencyError::Timeout(self.timeout)
        } else {
            DependencyError::Unreachable(err.to_string())
        }
    }
}

#[async_trait]
impl ScoringGateway for HttpScoringGateway {
    async fn score(&self, vector: &FeatureVector) -> Result<RiskScore, DependencyError> {
        let started = Instant::now();
        let result = self.retry.run(|_| self.score_once(vector)).await;
        histogram!("portal_gateway_request_seconds").record(started.elapsed().as_secs_f64());

        match &result {
            Ok(score) => debug!(?vector, score, "Scoring gateway responded"),
            Err(e) => {
                counter!("portal_gateway_failures_total", "reason" => e.reason()).increment(1);
                error!(error = %e, url = %self.url, "Scoring gateway call failed");
            }
        }
        result
    }
}
