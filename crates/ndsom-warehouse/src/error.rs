use thiserror::Error;

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (creating the database directory).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Query was rejected due to policy violation.
    #[error("query rejected: {0}")]
    QueryRejected(String),

    /// Query execution timed out.
    #[error("query timed out after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    /// Configured table name is not a plain SQL identifier.
    #[error("invalid table name '{name}': {reason}")]
    InvalidTableName { name: String, reason: &'static str },

    /// A row handed to the batch insert is missing a required value.
    #[error("row {index} rejected: {reason}")]
    InvalidRow { index: usize, reason: String },
}
