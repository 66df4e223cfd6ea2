//! CLI argument definitions for ndsom.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ingest` | Run one ingestion cycle |
//! | `watch` | Run ingestion cycles on an interval until Ctrl-C |
//! | `bootstrap` | Create the securities table if absent |
//! | `sql` | Read-only query against the warehouse |
//! | `instruments` | Distinct instrument ids on file |
//! | `history` | Time-ordered rows for one instrument |
//! | `purge` | Delete every stored row, keeping the table |
//!
//! Configuration flags fall back to `NDSOM_*` environment variables.
//!
//! # Examples
//!
//! ```bash
//! ndsom ingest --pretty
//! NDSOM_DB_PATH=/var/lib/ndsom/ndsom.duckdb ndsom watch --interval-secs 900
//! ndsom sql "SELECT ismt_idnt, ltp FROM ccil_securities LIMIT 5"
//! ndsom history IN0020230085 --limit 20
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use ndsom_core::{
    EndpointConfig, PipelineConfig, QueryGuardrails, RetryPolicy, TableName, WarehouseConfig,
    DEFAULT_REFRESH_INTERVAL,
};

use crate::error::CliError;

/// Ingest CCIL NDS-OM market statistics into DuckDB.
#[derive(Debug, Parser)]
#[command(
    name = "ndsom",
    author,
    version,
    about = "Ingest CCIL NDS-OM market statistics into DuckDB"
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

/// Process configuration, resolved once.
#[derive(Debug, Args)]
pub struct Settings {
    /// DuckDB database file.
    #[arg(long, global = true, env = "NDSOM_DB_PATH", default_value = "ndsom.duckdb")]
    pub db_path: PathBuf,

    /// Destination table.
    #[arg(long, global = true, env = "NDSOM_TABLE", default_value = ndsom_core::DEFAULT_TABLE_NAME)]
    pub table: String,

    /// Upstream resource URL.
    #[arg(long, global = true, env = "NDSOM_API_URL", default_value = ndsom_core::config::DEFAULT_API_URL)]
    pub api_url: String,

    /// Total attempts per fetch or storage operation.
    #[arg(long, global = true, env = "NDSOM_RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: u32,

    /// Fixed wait between attempts, in seconds.
    #[arg(long, global = true, env = "NDSOM_RETRY_DELAY_SECS", default_value_t = 5)]
    pub retry_delay_secs: u64,

    /// Upstream request timeout in milliseconds.
    #[arg(long, global = true, env = "NDSOM_HTTP_TIMEOUT_MS", default_value_t = 10_000)]
    pub http_timeout_ms: u64,

    /// Interval between scheduled cycles, in seconds.
    #[arg(long, global = true, env = "NDSOM_REFRESH_SECS", default_value_t = DEFAULT_REFRESH_INTERVAL.as_secs())]
    pub refresh_secs: u64,
}

impl Settings {
    pub fn pipeline_config(&self) -> Result<PipelineConfig, CliError> {
        let table = TableName::parse(&self.table)
            .map_err(|error| CliError::Config(error.to_string()))?;
        if self.api_url.trim().is_empty() {
            return Err(CliError::Config(String::from("api url must not be empty")));
        }
        if self.http_timeout_ms == 0 {
            return Err(CliError::Config(String::from(
                "http timeout must be greater than zero",
            )));
        }

        Ok(PipelineConfig {
            endpoint: EndpointConfig {
                base_url: self.api_url.trim().to_string(),
                timeout_ms: self.http_timeout_ms,
                ..EndpointConfig::default()
            },
            warehouse: WarehouseConfig {
                db_path: self.db_path.clone(),
                table,
            },
            query_guardrails: QueryGuardrails::default(),
            retry: RetryPolicy::new(
                self.retry_attempts,
                Duration::from_secs(self.retry_delay_secs),
            ),
            refresh_interval: Duration::from_secs(self.refresh_secs),
        })
    }
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch, validate and store one batch.
    Ingest,

    /// Run ingestion cycles on an interval until interrupted.
    ///
    /// A failed cycle is logged and the next one still runs.
    Watch(WatchArgs),

    /// Create the securities table if it does not exist.
    Bootstrap,

    /// Run a read-only SQL query against the warehouse.
    ///
    /// Only a single SELECT, WITH, EXPLAIN, SHOW or DESCRIBE statement is
    /// accepted.
    Sql(SqlArgs),

    /// List the distinct instrument ids on file.
    Instruments,

    /// Show stored rows for one instrument in ingestion order.
    History(HistoryArgs),

    /// Delete every stored row. The table is kept.
    Purge(PurgeArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Overrides the configured refresh interval.
    #[arg(long)]
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Args)]
pub struct SqlArgs {
    /// SQL query to execute.
    pub query: String,

    /// Maximum rows returned.
    #[arg(long, default_value_t = 10_000)]
    pub max_rows: usize,

    /// Query timeout in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    pub query_timeout_ms: u64,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Instrument id (`ismt_idnt`).
    pub instrument_id: String,

    /// Maximum rows returned.
    #[arg(long, default_value_t = 500)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct PurgeArgs {
    /// Confirm the deletion.
    #[arg(long, default_value_t = false)]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_to_a_valid_config() {
        let cli = Cli::try_parse_from(["ndsom", "ingest"]).expect("parse");
        let config = cli.settings.pipeline_config().expect("config");

        assert_eq!(config.warehouse.table.as_str(), "ccil_securities");
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.refresh_interval, Duration::from_secs(1800));
    }

    #[test]
    fn hostile_table_name_is_a_config_error() {
        let cli = Cli::try_parse_from(["ndsom", "--table", "x; DROP TABLE y", "bootstrap"])
            .expect("parse");
        let error = cli.settings.pipeline_config().expect_err("invalid table");
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn sql_accepts_guardrail_flags() {
        let cli = Cli::try_parse_from([
            "ndsom",
            "sql",
            "SELECT 1",
            "--max-rows",
            "5",
            "--query-timeout-ms",
            "100",
        ])
        .expect("parse");

        match cli.command {
            Command::Sql(args) => {
                assert_eq!(args.max_rows, 5);
                assert_eq!(args.query_timeout_ms, 100);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
