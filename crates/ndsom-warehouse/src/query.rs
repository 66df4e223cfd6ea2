//! Read-only tabular queries with guardrails.

use std::time::{Duration, Instant};

use ::duckdb::types::{TimeUnit, Value as DuckValue};
use ::duckdb::{Connection, ToSql};
use serde::Serialize;
use serde_json::{Number, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::WarehouseError;

/// Guardrails for query execution to prevent resource exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryGuardrails {
    /// Maximum number of rows to return.
    pub max_rows: usize,
    /// Query timeout in milliseconds.
    pub query_timeout_ms: u64,
}

impl Default for QueryGuardrails {
    fn default() -> Self {
        Self {
            max_rows: 10_000,
            query_timeout_ms: 5_000,
        }
    }
}

impl QueryGuardrails {
    fn timeout(self) -> Duration {
        Duration::from_millis(self.query_timeout_ms.max(1))
    }

    pub(crate) fn validate(self) -> Result<(), WarehouseError> {
        if self.max_rows == 0 {
            return Err(WarehouseError::QueryRejected(String::from(
                "max_rows must be greater than zero",
            )));
        }
        if self.query_timeout_ms == 0 {
            return Err(WarehouseError::QueryRejected(String::from(
                "query_timeout_ms must be greater than zero",
            )));
        }
        Ok(())
    }
}

/// Column metadata for query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlColumn {
    /// Column name.
    pub name: String,
    /// Column data type.
    #[serde(rename = "type")]
    pub r#type: String,
}

/// Uniform tabular result: ordered columns, ordered rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<SqlColumn>,
    /// Row data as JSON values, one inner vector per row in column order.
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    /// Whether results were cut at `max_rows`.
    pub truncated: bool,
}

impl QueryResult {
    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// Iterate the values of one column, in row order.
    pub fn column_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Value> + 'a {
        let index = self.column_index(name);
        self.rows
            .iter()
            .filter_map(move |row| index.and_then(|index| row.get(index)))
    }
}

/// Execute a SELECT-like statement and collect results.
pub(crate) fn execute_select_query(
    connection: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
    guardrails: QueryGuardrails,
) -> Result<QueryResult, WarehouseError> {
    let started = Instant::now();
    let mut statement = connection.prepare(sql)?;
    // Column metadata is only populated once the statement has run.
    let _ = statement.query(params)?;

    let column_count = statement.column_count();
    let mut columns = Vec::with_capacity(column_count);
    for index in 0..column_count {
        let name = statement.column_name(index)?.to_string();
        let dtype = statement.column_type(index);
        columns.push(SqlColumn {
            name,
            r#type: dtype.to_string(),
        });
    }

    let mut rows_cursor = statement.query(params)?;
    let mut rows = Vec::new();
    let mut truncated = false;

    while let Some(row) = rows_cursor.next()? {
        ensure_timeout(started, guardrails.timeout())?;

        if rows.len() >= guardrails.max_rows {
            truncated = true;
            break;
        }

        rows.push(read_row(row, column_count)?);
    }

    ensure_timeout(started, guardrails.timeout())?;

    Ok(QueryResult {
        columns,
        row_count: rows.len(),
        rows,
        truncated,
    })
}

fn read_row(row: &::duckdb::Row<'_>, column_count: usize) -> Result<Vec<Value>, ::duckdb::Error> {
    let mut output = Vec::with_capacity(column_count);
    for index in 0..column_count {
        let value: DuckValue = row.get(index)?;
        output.push(to_json_value(value));
    }
    Ok(output)
}

fn to_json_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(flag) => Value::Bool(flag),
        DuckValue::TinyInt(int) => Value::from(int),
        DuckValue::SmallInt(int) => Value::from(int),
        DuckValue::Int(int) => Value::from(int),
        DuckValue::BigInt(int) => Value::from(int),
        DuckValue::UTinyInt(int) => Value::from(int),
        DuckValue::USmallInt(int) => Value::from(int),
        DuckValue::UInt(int) => Value::from(int),
        DuckValue::UBigInt(int) => Value::from(int),
        DuckValue::Float(float) => number_from_f64(f64::from(float)),
        DuckValue::Double(float) => number_from_f64(float),
        DuckValue::Text(text) => Value::String(text),
        DuckValue::Blob(bytes) => Value::String(hex::encode(bytes)),
        DuckValue::Timestamp(unit, ticks) => timestamp_to_json(unit, ticks),
        other => Value::String(format!("{other:?}")),
    }
}

/// Render a TIMESTAMP as an RFC 3339 UTC string.
fn timestamp_to_json(unit: TimeUnit, value: i64) -> Value {
    let nanos = i128::from(value)
        * match unit {
            TimeUnit::Second => 1_000_000_000,
            TimeUnit::Millisecond => 1_000_000,
            TimeUnit::Microsecond => 1_000,
            TimeUnit::Nanosecond => 1,
        };
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|timestamp| timestamp.format(&Rfc3339).ok())
        .map(Value::String)
        .unwrap_or_else(|| Value::String(format!("Timestamp({unit:?}, {value})")))
}

/// NaN and infinities have no JSON form.
fn number_from_f64(float: f64) -> Value {
    Number::from_f64(float).map_or(Value::Null, Value::Number)
}

/// Trim whitespace and trailing semicolons.
pub(crate) fn normalize_sql(sql: &str) -> Result<&str, WarehouseError> {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    if trimmed.is_empty() {
        return Err(WarehouseError::QueryRejected(String::from("empty query")));
    }
    Ok(trimmed)
}

const READ_ONLY_KEYWORDS: [&str; 5] = ["SELECT", "WITH", "EXPLAIN", "SHOW", "DESCRIBE"];

/// Only a single SELECT-like statement reaches the connection.
pub(crate) fn enforce_read_only_query(sql: &str) -> Result<(), WarehouseError> {
    let leading = sql.split_whitespace().next().unwrap_or_default();
    if !READ_ONLY_KEYWORDS
        .iter()
        .any(|keyword| leading.eq_ignore_ascii_case(keyword))
    {
        return Err(WarehouseError::QueryRejected(format!(
            "'{leading}' is not a read-only statement; use {}",
            READ_ONLY_KEYWORDS.join("/")
        )));
    }

    let statements = count_statements(sql);
    if statements > 1 {
        return Err(WarehouseError::QueryRejected(format!(
            "expected one statement, found {statements}"
        )));
    }
    Ok(())
}

/// Non-empty `;`-separated statements, ignoring separators inside quoted
/// literals and identifiers. A doubled quote toggles twice, so escapes hold.
fn count_statements(sql: &str) -> usize {
    let mut quote: Option<char> = None;
    let mut statements = 0;
    let mut pending = false;
    for ch in sql.chars() {
        match (quote, ch) {
            (Some(open), _) if ch == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => {
                quote = Some(ch);
                pending = true;
            }
            (None, ';') => {
                statements += usize::from(pending);
                pending = false;
            }
            (None, _) if !ch.is_whitespace() => pending = true,
            (None, _) => {}
        }
    }
    statements + usize::from(pending)
}

fn ensure_timeout(started: Instant, timeout: Duration) -> Result<(), WarehouseError> {
    if started.elapsed() > timeout {
        return Err(WarehouseError::QueryTimeout {
            timeout_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
        });
    }
    Ok(())
}
