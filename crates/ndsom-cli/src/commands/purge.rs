use ndsom_core::PersistenceStore;
use serde_json::{json, Value};

use crate::cli::PurgeArgs;
use crate::error::CliError;

pub fn run(args: &PurgeArgs, store: &PersistenceStore) -> Result<Value, CliError> {
    if !args.yes {
        return Err(CliError::Command(format!(
            "purge deletes every row of '{}'; pass --yes to confirm",
            store.table()
        )));
    }

    store.ensure_schema()?;
    let deleted = store.purge_all()?;
    Ok(json!({
        "table": store.table().as_str(),
        "deleted": deleted,
    }))
}
