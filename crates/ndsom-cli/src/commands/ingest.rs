use std::sync::Arc;

use ndsom_core::{PipelineConfig, PipelineRunner, ReqwestHttpClient};
use serde_json::{json, Value};

use crate::error::CliError;

pub async fn run(config: &PipelineConfig) -> Result<Value, CliError> {
    let runner = runner(config)?;
    let report = runner.run_once().await?;

    Ok(json!({
        "report": report,
        "stats": runner.store().stats(),
    }))
}

pub(super) fn runner(config: &PipelineConfig) -> Result<PipelineRunner, CliError> {
    let http = ReqwestHttpClient::with_user_agent(&config.endpoint.user_agent)?;
    Ok(PipelineRunner::new(config, Arc::new(http)))
}
