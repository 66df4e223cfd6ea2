//! # NDS-OM Core
//!
//! Ingestion pipeline for the CCIL NDS-OM securities market-watch feed.
//!
//! ## Overview
//!
//! One cycle fetches the upstream envelope, validates every record on its own,
//! stamps the accepted ones with a shared ingestion time and appends them to
//! the warehouse table in a single transaction:
//!
//! - **Fetcher**: HTTP GET with the fixed portlet parameters, envelope unwrapping
//! - **Transformer**: per-record validation with rejection isolation
//! - **PersistenceStore**: schema bootstrap, batch insert, guarded queries, purge
//! - **RetryPolicy**: fixed-delay bounded retry with an explicit exhaustion error
//! - **PipelineRunner / Scheduler**: one cycle, or cycles on an interval
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Endpoint and pipeline configuration |
//! | [`error`] | Transport, schema, validation and pipeline errors |
//! | [`fetcher`] | Upstream fetch and envelope parsing |
//! | [`http_client`] | HTTP client abstraction |
//! | [`pipeline`] | Cycle runner and scheduler |
//! | [`record`] | Raw and validated record types |
//! | [`retry`] | Retry policy |
//! | [`store`] | Retried facade over the warehouse |
//! | [`transform`] | Batch validation and timestamping |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ndsom_core::{PipelineConfig, PipelineRunner, ReqwestHttpClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let runner = PipelineRunner::new(&config, Arc::new(ReqwestHttpClient::new()?));
//!
//!     let report = runner.run_once().await?;
//!     println!("inserted {} rows", report.inserted);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! A record that fails validation becomes a [`Rejection`] and the cycle goes
//! on. Everything else is fatal to the cycle and surfaces as a
//! [`PipelineError`]; retried failures carry the attempt count and last error
//! in [`RetryExhausted`].

pub mod config;
pub mod error;
pub mod fetcher;
pub mod http_client;
pub mod pipeline;
pub mod record;
pub mod retry;
pub mod store;
pub mod transform;

pub use config::{EndpointConfig, PipelineConfig, DEFAULT_REFRESH_INTERVAL};

pub use error::{
    FieldIssue, PersistenceError, PipelineError, RetryExhausted, SchemaError, TransportError,
    ValidationError,
};

pub use fetcher::{parse_envelope, Fetcher};

pub use http_client::{
    HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient, ScriptedHttpClient,
};

pub use pipeline::{CycleReport, PipelineRunner, Scheduler, SchedulerSummary};

pub use record::{storage_timestamp, IngestedRow, RawRecord, ValidatedRecord};

pub use retry::RetryPolicy;

pub use store::PersistenceStore;

pub use transform::{Batch, Rejection, Transformer};

// Warehouse (re-exported from ndsom-warehouse)
pub use ndsom_warehouse::{
    QueryGuardrails, QueryResult, SchemaStatus, SqlColumn, TableName, WarehouseConfig,
    WarehouseStats, DEFAULT_TABLE_NAME,
};
