use ndsom_core::{PersistenceStore, QueryGuardrails, QueryResult};
use serde_json::{json, Value};

use crate::cli::{HistoryArgs, SqlArgs};
use crate::error::CliError;

pub fn sql(args: &SqlArgs, store: &PersistenceStore) -> Result<Value, CliError> {
    let guardrails = QueryGuardrails {
        max_rows: args.max_rows,
        query_timeout_ms: args.query_timeout_ms,
    };
    let result = store.query_with(&args.query, guardrails)?;
    Ok(json!({
        "query": args.query,
        "result": result,
    }))
}

pub fn instruments(store: &PersistenceStore) -> Result<Value, CliError> {
    store.ensure_schema()?;
    let result = store.instrument_ids()?;
    Ok(json!({
        "instruments": first_column(&result),
        "count": result.row_count,
    }))
}

pub fn history(args: &HistoryArgs, store: &PersistenceStore) -> Result<Value, CliError> {
    let instrument_id = args.instrument_id.trim();
    if instrument_id.is_empty() {
        return Err(CliError::Command(String::from(
            "instrument id must not be empty",
        )));
    }

    store.ensure_schema()?;
    let result = store.instrument_history(instrument_id, args.limit)?;
    Ok(json!({
        "instrument_id": instrument_id,
        "result": result,
    }))
}

fn first_column(result: &QueryResult) -> Vec<Value> {
    result
        .rows
        .iter()
        .filter_map(|row| row.first().cloned())
        .collect()
}
