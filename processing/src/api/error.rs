use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{
    auth::AuthError,
    batch::BatchError,
    evaluator::EvaluationError,
    scorers::DependencyError,
    storage::BlobError,
};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("upload too large")]
    PayloadTooLarge,

    #[error("scoring service failed: {0}")]
    Dependency(DependencyError),

    #[error("storage failed: {0}")]
    Storage(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid username or password"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            ApiError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "Uploaded file is too large"),
            ApiError::Dependency(e) => {
                tracing::error!(error = %e, "Scoring service error");
                (StatusCode::BAD_GATEWAY, "Scoring service unavailable")
            }
            ApiError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage unavailable")
            }
            ApiError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down"),
            ApiError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please try again later",
            ),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        let mut response = (status, body).into_response();
        if let ApiError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

impl From<EvaluationError> for ApiError {
    fn from(err: EvaluationError) -> Self {
        match err {
            EvaluationError::Validation(e) => ApiError::Validation(e.to_string()),
            EvaluationError::Dependency(e) => ApiError::Dependency(e),
        }
    }
}

impl From<BlobError> for ApiError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound(_) => ApiError::NotFound("Unknown s3Key".to_string()),
            BlobError::InvalidKey(_) => ApiError::Validation("Invalid s3Key".to_string()),
            BlobError::Io(e) => ApiError::Storage(e.to_string()),
        }
    }
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Blob(e) => e.into(),
            e @ (BatchError::Csv(_) | BatchError::MissingColumns(_)) => ApiError::Validation(e.to_string()),
            BatchError::Cancelled { .. } => ApiError::Cancelled,
            BatchError::Dependency(e) => ApiError::Dependency(e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::MissingToken | AuthError::InvalidToken => ApiError::Unauthorized,
            AuthError::Issue(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::Validation(err.body_text())
        }
    }
}
