//! # NDS-OM Warehouse
//!
//! DuckDB-backed storage for ingested securities-market statistics.
//!
//! ## Overview
//!
//! The warehouse exclusively owns one append-only table and the single live
//! connection to it:
//!
//! - **Lazy connection**: opened on first use, memoized afterwards
//! - **Bootstrap**: catalog lookup, create-if-absent, safe to call every cycle
//! - **Batch insert**: parameterized, one committed transaction per call
//! - **Query**: read-only guarded SQL returning a uniform tabular result
//! - **Purge**: delete every row, keep the table
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ndsom_warehouse::{QueryGuardrails, Warehouse, WarehouseConfig};
//!
//! fn main() -> Result<(), ndsom_warehouse::WarehouseError> {
//!     let warehouse = Warehouse::new(WarehouseConfig::default());
//!     warehouse.ensure_table()?;
//!
//!     let ids = warehouse.instrument_ids(QueryGuardrails::default())?;
//!     println!("{} instruments on file", ids.row_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Table
//!
//! | Column | Type |
//! |--------|------|
//! | `ismt_idnt` | VARCHAR |
//! | `ttc` | BIGINT |
//! | `tta`, `op`, `hi`, `lo`, `ltp` | DOUBLE |
//! | `arrow`, `indicator` | VARCHAR |
//! | `lty`, `prev_trad_rate`, `trade_yeild` | DOUBLE |
//! | `mrkt_indc`, `book_indc` | VARCHAR |
//! | `download_timestamp` | TIMESTAMP |

pub mod connection;
pub mod error;
pub mod query;
pub mod table;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use ::duckdb::{Connection, ToSql};
use serde::Serialize;
use tracing::{debug, info};

pub use connection::{ConnectionHandle, LazyConnection};
pub use error::WarehouseError;
pub use query::{QueryGuardrails, QueryResult, SqlColumn};
pub use table::{TableName, COLUMNS, DEFAULT_TABLE_NAME};

/// Configuration for the warehouse database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseConfig {
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Destination table.
    pub table: TableName,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("ndsom.duckdb"),
            table: TableName::default(),
        }
    }
}

/// One row of the securities table, in storage types.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityRow {
    pub instrument_id: String,
    pub trade_count: i64,
    pub traded_amount: f64,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub last_traded_price: f64,
    pub trend_arrow: String,
    pub indicator: String,
    pub latest_yield: f64,
    pub previous_trade_rate: f64,
    pub trade_yield: f64,
    pub market_indicator: String,
    pub book_indicator: String,
    /// `YYYY-MM-DD HH:MM:SS.ffffff` in UTC.
    pub download_timestamp: String,
}

impl SecurityRow {
    fn check(&self, index: usize) -> Result<(), WarehouseError> {
        if self.instrument_id.trim().is_empty() {
            return Err(WarehouseError::InvalidRow {
                index,
                reason: String::from("ismt_idnt is empty"),
            });
        }
        if self.download_timestamp.trim().is_empty() {
            return Err(WarehouseError::InvalidRow {
                index,
                reason: String::from("download_timestamp is empty"),
            });
        }
        Ok(())
    }
}

/// Outcome of [`Warehouse::ensure_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaStatus {
    Created,
    AlreadyPresent,
}

/// Counters for operational diagnosis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarehouseStats {
    pub connections_opened: u64,
    pub tables_created: u64,
    pub commits: u64,
    pub rows_inserted: u64,
}

#[derive(Debug, Default)]
struct Counters {
    tables_created: AtomicU64,
    commits: AtomicU64,
    rows_inserted: AtomicU64,
}

/// Owner of the securities table and its connection.
pub struct Warehouse {
    config: WarehouseConfig,
    connection: LazyConnection,
    counters: Counters,
}

impl Warehouse {
    /// Build a warehouse. The database is not touched until first use.
    pub fn new(config: WarehouseConfig) -> Self {
        let connection = LazyConnection::new(config.db_path.clone());
        Self {
            config,
            connection,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub fn table(&self) -> &TableName {
        &self.config.table
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.connection.db_path()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Open the connection if it is not open yet. Repeated calls reuse it.
    pub fn connect(&self) -> Result<(), WarehouseError> {
        self.connection.acquire().map(|_| ())
    }

    /// Catalog lookup for the configured table.
    pub fn table_exists(&self) -> Result<bool, WarehouseError> {
        let connection = self.connection.acquire()?;
        table_exists_on(&connection, &self.config.table)
    }

    /// Create the table when the catalog does not list it.
    ///
    /// Idempotent: once the table exists no create statement is issued.
    pub fn ensure_table(&self) -> Result<SchemaStatus, WarehouseError> {
        let connection = self.connection.acquire()?;
        if table_exists_on(&connection, &self.config.table)? {
            debug!(table = %self.config.table, "table already present");
            return Ok(SchemaStatus::AlreadyPresent);
        }

        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = connection
            .execute_batch(table::create_table_sql(&self.config.table).as_str())
            .map_err(WarehouseError::from);
        self.finalize_transaction(&connection, result)?;

        self.counters.tables_created.fetch_add(1, Ordering::Relaxed);
        info!(table = %self.config.table, "created securities table");
        Ok(SchemaStatus::Created)
    }

    /// Append every row inside one transaction, committed once per call.
    ///
    /// # Security
    /// Values are bound as parameters; only the validated table name is
    /// interpolated.
    pub fn insert_rows(&self, rows: &[SecurityRow]) -> Result<usize, WarehouseError> {
        for (index, row) in rows.iter().enumerate() {
            row.check(index)?;
        }

        let insert_sql = table::insert_sql(&self.config.table);
        let connection = self.connection.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            let mut statement = connection.prepare(insert_sql.as_str())?;
            for row in rows {
                let params: [&dyn ToSql; 15] = [
                    &row.instrument_id,
                    &row.trade_count,
                    &row.traded_amount,
                    &row.open_price,
                    &row.high_price,
                    &row.low_price,
                    &row.last_traded_price,
                    &row.trend_arrow,
                    &row.indicator,
                    &row.latest_yield,
                    &row.previous_trade_rate,
                    &row.trade_yield,
                    &row.market_indicator,
                    &row.book_indicator,
                    &row.download_timestamp,
                ];
                statement.execute(params.as_slice())?;
            }
            Ok(rows.len())
        })();

        let inserted = self.finalize_transaction(&connection, result)?;
        self.counters
            .rows_inserted
            .fetch_add(inserted as u64, Ordering::Relaxed);
        debug!(table = %self.config.table, rows = inserted, "committed batch");
        Ok(inserted)
    }

    /// Execute an ad-hoc read query.
    ///
    /// # Security
    /// Only single SELECT-like statements are accepted. The SQL text itself is
    /// not parameterized; callers building it from user input should prefer
    /// [`Warehouse::instrument_history`] and friends.
    pub fn execute_query(
        &self,
        sql: &str,
        guardrails: QueryGuardrails,
    ) -> Result<QueryResult, WarehouseError> {
        guardrails.validate()?;
        let sql = query::normalize_sql(sql)?;
        query::enforce_read_only_query(sql)?;

        let connection = self.connection.acquire()?;
        query::execute_select_query(&connection, sql, &[], guardrails)
    }

    /// Distinct instrument ids, sorted, for selector population.
    pub fn instrument_ids(&self, guardrails: QueryGuardrails) -> Result<QueryResult, WarehouseError> {
        guardrails.validate()?;
        let sql = table::distinct_instruments_sql(&self.config.table);
        let connection = self.connection.acquire()?;
        query::execute_select_query(&connection, sql.as_str(), &[], guardrails)
    }

    /// Rows for one instrument ordered by `download_timestamp`.
    pub fn instrument_history(
        &self,
        instrument_id: &str,
        limit: usize,
        guardrails: QueryGuardrails,
    ) -> Result<QueryResult, WarehouseError> {
        guardrails.validate()?;
        let sql = table::instrument_history_sql(&self.config.table, limit);
        let connection = self.connection.acquire()?;
        let params: [&dyn ToSql; 1] = [&instrument_id];
        query::execute_select_query(&connection, sql.as_str(), params.as_slice(), guardrails)
    }

    /// Delete every row, keeping the table. Returns the number of rows removed.
    pub fn purge(&self) -> Result<usize, WarehouseError> {
        let connection = self.connection.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = connection
            .execute(table::purge_sql(&self.config.table).as_str(), [])
            .map_err(WarehouseError::from);
        let deleted = self.finalize_transaction(&connection, result)?;
        info!(table = %self.config.table, rows = deleted, "purged securities table");
        Ok(deleted)
    }

    pub fn stats(&self) -> WarehouseStats {
        WarehouseStats {
            connections_opened: self.connection.opened_count(),
            tables_created: self.counters.tables_created.load(Ordering::Relaxed),
            commits: self.counters.commits.load(Ordering::Relaxed),
            rows_inserted: self.counters.rows_inserted.load(Ordering::Relaxed),
        }
    }

    /// Commit on success or roll back on failure.
    fn finalize_transaction<T>(
        &self,
        connection: &Connection,
        result: Result<T, WarehouseError>,
    ) -> Result<T, WarehouseError> {
        match result {
            Ok(value) => {
                connection.execute_batch("COMMIT")?;
                self.counters.commits.fetch_add(1, Ordering::Relaxed);
                Ok(value)
            }
            Err(error) => {
                let _ = connection.execute_batch("ROLLBACK");
                Err(error)
            }
        }
    }
}

fn table_exists_on(connection: &Connection, table: &TableName) -> Result<bool, WarehouseError> {
    let count: i64 = connection.query_row(
        table::TABLE_EXISTS_SQL,
        ::duckdb::params![table.as_str()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
