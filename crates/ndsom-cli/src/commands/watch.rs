use std::time::Duration;

use ndsom_core::{PipelineConfig, Scheduler};
use serde_json::{json, Value};
use tracing::warn;

use crate::cli::WatchArgs;
use crate::error::CliError;

pub async fn run(args: &WatchArgs, config: &PipelineConfig) -> Result<Value, CliError> {
    let interval = args
        .interval_secs
        .map(Duration::from_secs)
        .unwrap_or(config.refresh_interval);
    if interval.is_zero() {
        return Err(CliError::Config(String::from(
            "refresh interval must be greater than zero",
        )));
    }

    let scheduler = Scheduler::new(super::ingest::runner(config)?, interval);
    let summary = scheduler
        .run(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(%error, "could not listen for Ctrl-C, stopping");
            }
        })
        .await;

    Ok(json!({
        "interval_secs": interval.as_secs(),
        "summary": summary,
        "stats": scheduler.runner().store().stats(),
    }))
}
