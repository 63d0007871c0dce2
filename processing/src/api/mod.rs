pub mod error;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;

pub use error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use common::config::BackendConfig;

use crate::{
    auth::Authenticator, batch::BatchAnalyzer, evaluator::Evaluator, model::GenericError, results::ResultsLedger,
    storage::BlobStore,
};

#[derive(Clone)]
pub struct AppState {
    pub evaluator: Evaluator,
    pub batch: Arc<dyn BatchAnalyzer>,
    pub blob_store: Arc<dyn BlobStore>,
    pub auth: Arc<Authenticator>,
    pub ledger: Arc<ResultsLedger>,
    /// Cancelled on shutdown; every batch runs under a child of it.
    pub shutdown: CancellationToken,
    pub metrics: Option<PrometheusHandle>,
}

fn cors_layer(origin: &str) -> Result<CorsLayer, GenericError> {
    let allow_origin = if origin == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::exact(origin.parse::<HeaderValue>()?)
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

pub fn router(state: AppState, config: &BackendConfig) -> Result<Router, GenericError> {
    let protected = Router::new()
        .route("/fraud", post(handlers::fraud))
        .route("/results", get(handlers::results))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), middleware::require_auth));

    let api = Router::new()
        .route("/single-check", post(handlers::single_check))
        .route("/upload", post(handlers::upload))
        .route("/login", post(handlers::login))
        .merge(protected);
    let api = match rate_limit::RateLimiter::from_config(&config.rate_limit) {
        Some(limiter) => api.layer(axum::middleware::from_fn_with_state(
            Arc::new(limiter),
            rate_limit::limit_requests,
        )),
        None => api,
    };

    let app = Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origin)?)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .with_state(state);

    Ok(app)
}
