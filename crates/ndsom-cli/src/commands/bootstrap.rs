use ndsom_core::PersistenceStore;
use serde_json::{json, Value};

use crate::error::CliError;

pub fn run(store: &PersistenceStore) -> Result<Value, CliError> {
    let status = store.ensure_schema()?;
    Ok(json!({
        "table": store.table().as_str(),
        "db_path": store.db_path().display().to_string(),
        "status": status,
    }))
}
