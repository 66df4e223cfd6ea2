mod bootstrap;
mod ingest;
mod purge;
mod query;
mod watch;

use ndsom_core::{PersistenceStore, PipelineConfig};
use serde_json::Value;

use crate::cli::Command;
use crate::error::CliError;

pub async fn run(command: &Command, config: &PipelineConfig) -> Result<Value, CliError> {
    match command {
        Command::Ingest => ingest::run(config).await,
        Command::Watch(args) => watch::run(args, config).await,
        Command::Bootstrap => bootstrap::run(&store(config)),
        Command::Sql(args) => query::sql(args, &store(config)),
        Command::Instruments => query::instruments(&store(config)),
        Command::History(args) => query::history(args, &store(config)),
        Command::Purge(args) => purge::run(args, &store(config)),
    }
}

fn store(config: &PipelineConfig) -> PersistenceStore {
    PersistenceStore::new(
        config.warehouse.clone(),
        config.retry,
        config.query_guardrails,
    )
}
