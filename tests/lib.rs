// Shared fixtures for the behavior tests
pub use ndsom_core::{
    HttpClient, HttpError, HttpResponse, PersistenceStore, PipelineConfig, PipelineRunner,
    QueryGuardrails, RetryPolicy, ScriptedHttpClient, TableName, WarehouseConfig,
};
pub use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

/// A record that passes validation, shaped like the live feed.
pub fn complete_record(instrument_id: &str, trade_count: i64) -> Value {
    json!({
        "ismt_idnt": instrument_id,
        "ttc": trade_count,
        "tta": 1000.5,
        "op": 99.9,
        "hi": 101.0,
        "lo": 98.5,
        "ltp": 100.0,
        "arrow": "down red",
        "indicator": "G",
        "lty": 7.55,
        "prev_trad_rate": 90.33,
        "trade_yeild": 90.34,
        "mrkt_indc": "CONT",
        "book_indc": "RGLR"
    })
}

/// Upstream body: the record array JSON-encoded under `result1`.
pub fn envelope_body(records: &[Value]) -> String {
    let encoded = Value::Array(records.to_vec()).to_string();
    json!({ "result1": encoded }).to_string()
}

pub fn ok(records: &[Value]) -> Result<HttpResponse, HttpError> {
    Ok(HttpResponse::ok_json(envelope_body(records)))
}

pub fn warehouse_config(temp: &TempDir) -> WarehouseConfig {
    WarehouseConfig {
        db_path: temp.path().join("ndsom.duckdb"),
        table: TableName::default(),
    }
}

pub fn pipeline_config(temp: &TempDir, retry: RetryPolicy) -> PipelineConfig {
    PipelineConfig {
        warehouse: warehouse_config(temp),
        retry,
        ..PipelineConfig::default()
    }
}

/// A runner wired to a scripted upstream.
pub fn runner(temp: &TempDir, client: &Arc<ScriptedHttpClient>, retry: RetryPolicy) -> PipelineRunner {
    let http: Arc<dyn HttpClient> = client.clone();
    PipelineRunner::new(&pipeline_config(temp, retry), http)
}

pub fn store(temp: &TempDir) -> PersistenceStore {
    PersistenceStore::new(
        warehouse_config(temp),
        RetryPolicy::no_retry(),
        QueryGuardrails::default(),
    )
}

/// Single-value count query.
pub fn count(store: &PersistenceStore, sql: &str) -> i64 {
    let result = store.query(sql).expect("count query");
    result.rows[0][0].as_i64().expect("integer count")
}
