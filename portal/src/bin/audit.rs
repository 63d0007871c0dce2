use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use portal::build_evaluator;
use processing::{
    batch::{PipelineBatchEvaluator, TierCostLeakage},
    executable_utils::load_config,
    storage::InMemoryBlobStore,
};

/// Scores a beneficiary CSV offline and prints the batch result as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CSV file with bankAccount, mobile and age columns
    input: PathBuf,

    /// Path to config file
    #[arg(short, long, default_value = "target/debug/config/total_config.yaml")]
    config: String,

    /// Overrides batch.top_n
    #[arg(long)]
    top_n: Option<usize>,

    /// Also write the per-row CSV export here
    #[arg(long)]
    csv_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(&args.config).map_err(|e| anyhow::anyhow!(e))?;
    if let Some(top_n) = args.top_n {
        config.batch.top_n = top_n;
    }

    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let evaluator = build_evaluator(&config).await.map_err(|e| anyhow::anyhow!(e))?;
    let pipeline = PipelineBatchEvaluator::from_config(
        evaluator,
        Arc::new(InMemoryBlobStore::new()),
        Arc::new(TierCostLeakage::from_config(&config.batch)),
        &config.batch,
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let result = pipeline
        .evaluate_bytes(&bytes, &cancel)
        .await
        .context("batch evaluation failed")?;

    if let Some(path) = &args.csv_out {
        tokio::fs::write(path, &result.csv_results)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
