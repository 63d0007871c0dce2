use std::net::SocketAddr;

use clap::Parser;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use common::config::{BackendConfig, Config};

use crate::{
    api::{router, AppState},
    model::GenericError,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to config file
    #[arg(short, long, default_value = "target/debug/config/total_config.yaml")]
    pub config: String,
}

/// Loads `.env`, then the config file named on the command line.
pub fn initialize_executable() -> Result<Config, GenericError> {
    let args = Args::parse();
    load_config(&args.config)
}

/// Config file first, then tracing at the configured level, then
/// environment overrides and validation.
pub fn load_config(path: &str) -> Result<Config, GenericError> {
    dotenvy::dotenv().ok();
    let mut config = Config::load(path)?;
    initialize_tracing(&config.backend.log_level);
    tracing::info!(path = %path, "Loaded config file");
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Logs go to stderr. `RUST_LOG` wins over the configured level when set.
pub fn initialize_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

pub fn install_metrics_recorder() -> Result<PrometheusHandle, GenericError> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = token.cancelled() => {},
    }
    tracing::info!("Shutting down, cancelling in-flight batches");
    token.cancel();
}

pub async fn run_backend(config: BackendConfig, state: AppState) -> Result<(), GenericError> {
    let shutdown = state.shutdown.clone();
    let app = router(state, &config)?;

    tracing::info!("Starting backend service at {}", config.server_address);
    let listener = tokio::net::TcpListener::bind(&config.server_address).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}
