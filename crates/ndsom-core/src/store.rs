use std::path::Path;

use ndsom_warehouse::{
    QueryGuardrails, QueryResult, SchemaStatus, SecurityRow, TableName, Warehouse,
    WarehouseConfig, WarehouseStats,
};
use tracing::info;

use crate::error::{PersistenceError, RetryExhausted};
use crate::record::IngestedRow;
use crate::retry::RetryPolicy;

type StoreResult<T> = Result<T, RetryExhausted<PersistenceError>>;

/// Sole owner of the destination table and its connection.
///
/// Every operation runs under the retry policy individually. Reads go through
/// the same guardrails unless the caller supplies its own.
///
/// The plain methods wait between attempts with a thread sleep. Code running
/// on the tokio runtime uses the `_async` variants, whose waits go through the
/// tokio timer.
pub struct PersistenceStore {
    warehouse: Warehouse,
    retry: RetryPolicy,
    guardrails: QueryGuardrails,
}

impl PersistenceStore {
    pub fn new(config: WarehouseConfig, retry: RetryPolicy, guardrails: QueryGuardrails) -> Self {
        Self {
            warehouse: Warehouse::new(config),
            retry,
            guardrails,
        }
    }

    pub fn table(&self) -> &TableName {
        self.warehouse.table()
    }

    pub fn db_path(&self) -> &Path {
        self.warehouse.db_path()
    }

    pub fn is_connected(&self) -> bool {
        self.warehouse.is_connected()
    }

    /// Open the connection lazily; repeated calls reuse it.
    pub fn connect(&self) -> StoreResult<()> {
        self.retry.run_blocking("connect", || self.warehouse.connect())
    }

    pub fn ensure_schema(&self) -> StoreResult<SchemaStatus> {
        self.retry
            .run_blocking("ensure_schema", || self.warehouse.ensure_table())
    }

    pub async fn ensure_schema_async(&self) -> StoreResult<SchemaStatus> {
        self.run_async("ensure_schema", || self.warehouse.ensure_table())
            .await
    }

    /// Append the batch in one committed transaction.
    pub fn insert_batch(&self, rows: &[IngestedRow]) -> StoreResult<usize> {
        let inserted = self.retry.run_blocking("insert_batch", || {
            self.warehouse.insert_rows(&security_rows(rows)?)
        })?;
        info!(table = %self.table(), rows = inserted, "inserted batch");
        Ok(inserted)
    }

    pub async fn insert_batch_async(&self, rows: &[IngestedRow]) -> StoreResult<usize> {
        let inserted = self
            .run_async("insert_batch", || {
                self.warehouse.insert_rows(&security_rows(rows)?)
            })
            .await?;
        info!(table = %self.table(), rows = inserted, "inserted batch");
        Ok(inserted)
    }

    pub fn query(&self, sql: &str) -> StoreResult<QueryResult> {
        self.query_with(sql, self.guardrails)
    }

    pub fn query_with(&self, sql: &str, guardrails: QueryGuardrails) -> StoreResult<QueryResult> {
        self.retry
            .run_blocking("query", || self.warehouse.execute_query(sql, guardrails))
    }

    pub fn instrument_ids(&self) -> StoreResult<QueryResult> {
        self.retry.run_blocking("instrument_ids", || {
            self.warehouse.instrument_ids(self.guardrails)
        })
    }

    pub fn instrument_history(&self, instrument_id: &str, limit: usize) -> StoreResult<QueryResult> {
        self.retry.run_blocking("instrument_history", || {
            self.warehouse
                .instrument_history(instrument_id, limit, self.guardrails)
        })
    }

    /// Delete every row, keeping the table.
    pub fn purge_all(&self) -> StoreResult<usize> {
        self.retry.run_blocking("purge_all", || self.warehouse.purge())
    }

    pub fn stats(&self) -> WarehouseStats {
        self.warehouse.stats()
    }

    async fn run_async<T, F>(&self, operation: &'static str, mut call: F) -> StoreResult<T>
    where
        F: FnMut() -> Result<T, PersistenceError>,
    {
        self.retry
            .run(operation, || std::future::ready(call()))
            .await
    }
}

fn security_rows(rows: &[IngestedRow]) -> Result<Vec<SecurityRow>, PersistenceError> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            row.to_security_row()
                .map_err(|error| PersistenceError::InvalidRow {
                    index,
                    reason: format!("download timestamp: {error}"),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn rejected_query_is_retried_until_exhausted() {
        let temp = tempdir().expect("tempdir");
        let store = PersistenceStore::new(
            WarehouseConfig {
                db_path: temp.path().join("store.duckdb"),
                table: TableName::default(),
            },
            RetryPolicy::new(3, Duration::from_millis(1)),
            QueryGuardrails::default(),
        );

        let error = store.query("DELETE FROM ccil_securities").expect_err("write");
        assert_eq!(error.attempts(), 3);
        assert!(matches!(error.last_error(), PersistenceError::QueryRejected(_)));
        assert!(!store.is_connected());
    }

    #[test]
    fn connect_is_memoized() {
        let temp = tempdir().expect("tempdir");
        let store = PersistenceStore::new(
            WarehouseConfig {
                db_path: temp.path().join("nested").join("store.duckdb"),
                table: TableName::default(),
            },
            RetryPolicy::no_retry(),
            QueryGuardrails::default(),
        );

        store.connect().expect("first");
        store.connect().expect("second");
        assert!(store.db_path().exists());
        assert_eq!(store.stats().connections_opened, 1);
    }

    #[tokio::test]
    async fn async_variants_share_the_connection_and_counters() {
        let temp = tempdir().expect("tempdir");
        let store = PersistenceStore::new(
            WarehouseConfig {
                db_path: temp.path().join("store.duckdb"),
                table: TableName::default(),
            },
            RetryPolicy::no_retry(),
            QueryGuardrails::default(),
        );

        assert_eq!(
            store.ensure_schema_async().await.expect("create"),
            SchemaStatus::Created
        );
        assert_eq!(store.insert_batch_async(&[]).await.expect("empty"), 0);
        assert_eq!(
            store.ensure_schema().expect("again"),
            SchemaStatus::AlreadyPresent
        );

        let stats = store.stats();
        assert_eq!(stats.connections_opened, 1);
        assert_eq!(stats.commits, 2);
    }
}
