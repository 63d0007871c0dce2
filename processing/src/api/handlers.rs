use axum::{
    extract::{rejection::JsonRejection, Extension, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::Claims,
    model::{BatchResult, FeatureVector, RawBeneficiaryRecord, RiskScore, RiskTier},
    results::ResultsSummary,
};

use super::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleCheckResponse {
    pub risk_score: RiskScore,
    pub risk_level: RiskTier,
    pub features: FeatureVector,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub s3_key: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudRequest {
    pub s3_key: Option<String>,
}

pub async fn single_check(
    State(state): State<AppState>,
    payload: Result<Json<RawBeneficiaryRecord>, JsonRejection>,
) -> ApiResult<Json<SingleCheckResponse>> {
    let Json(raw) = payload?;
    let evaluation = state.evaluator.evaluate_one(&raw).await?;
    state.ledger.record_single(&evaluation);

    Ok(Json(SingleCheckResponse {
        risk_score: evaluation.score,
        risk_level: evaluation.tier,
        features: evaluation.features,
    }))
}

/// Stores the multipart field `file` and returns the key it was stored under.
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.csv").to_string();
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(ApiError::Validation("Uploaded file is empty".to_string()));
        }

        let size = bytes.len();
        let key = state.blob_store.put(&file_name, bytes.to_vec()).await?;
        tracing::info!(key = %key, size, "Stored upload");
        return Ok(Json(UploadResponse { s3_key: key }));
    }
    Err(ApiError::Validation("No file uploaded".to_string()))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(request) = payload?;
    let token = state.auth.issue(&request.username, &request.password)?;
    Ok(Json(LoginResponse { token }))
}

pub async fn fraud(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<FraudRequest>, JsonRejection>,
) -> ApiResult<Json<BatchResult>> {
    let Json(request) = payload?;
    let key = request
        .s3_key
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Missing s3Key".to_string()))?;

    tracing::info!(key = %key, user = %claims.sub, "Batch evaluation requested");
    let result = state.batch.evaluate_batch(&key, state.shutdown.child_token()).await?;
    state.ledger.record_batch(&result);
    Ok(Json(result))
}

pub async fn results(State(state): State<AppState>) -> Json<ResultsSummary> {
    Json(state.ledger.summary())
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
