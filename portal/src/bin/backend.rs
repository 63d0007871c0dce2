use std::error::Error;

use portal::build_app_state;
use processing::executable_utils::{initialize_executable, install_metrics_recorder, run_backend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = initialize_executable()?;
    tracing::info!(project = %config.common.project_name, "Starting backend");

    let metrics = install_metrics_recorder()?;
    let state = build_app_state(&config, Some(metrics)).await?;
    run_backend(config.backend, state).await
}
