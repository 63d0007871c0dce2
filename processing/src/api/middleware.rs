use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use super::{ApiError, AppState};

/// Rejects requests without a valid bearer token and exposes the decoded
/// claims to handlers as a request extension.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let header = req.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok());
    let claims = state.auth.authorize_header(header).inspect_err(|e| {
        tracing::warn!(error = %e, path = %req.uri().path(), "Rejected unauthenticated request");
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
