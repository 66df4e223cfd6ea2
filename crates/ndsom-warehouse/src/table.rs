//! Securities table identity and statements.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::WarehouseError;

const MAX_TABLE_NAME_LEN: usize = 64;

/// Default destination table, matching the dashboard's historical queries.
pub const DEFAULT_TABLE_NAME: &str = "ccil_securities";

/// Column order used by every insert. Positional, never reordered.
pub const COLUMNS: [&str; 15] = [
    "ismt_idnt",
    "ttc",
    "tta",
    "op",
    "hi",
    "lo",
    "ltp",
    "arrow",
    "indicator",
    "lty",
    "prev_trad_rate",
    "trade_yeild",
    "mrkt_indc",
    "book_indc",
    "download_timestamp",
];

/// Validated SQL identifier for the securities table.
///
/// The name is configured rather than user supplied, but it is still
/// interpolated into DDL/DML, so only plain identifiers are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    /// Parse a table identifier.
    ///
    /// # Errors
    /// Returns [`WarehouseError::InvalidTableName`] for empty, over-long, or
    /// non-identifier input.
    pub fn parse(input: &str) -> Result<Self, WarehouseError> {
        let trimmed = input.trim();
        let invalid = |reason| WarehouseError::InvalidTableName {
            name: input.to_string(),
            reason,
        };

        if trimmed.is_empty() {
            return Err(invalid("name cannot be empty"));
        }
        if trimmed.len() > MAX_TABLE_NAME_LEN {
            return Err(invalid("name exceeds 64 characters"));
        }
        if let Some(first) = trimmed.chars().next() {
            if !(first.is_ascii_alphabetic() || first == '_') {
                return Err(invalid("name must start with an ASCII letter or underscore"));
            }
        }
        if !trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(invalid("name may contain only ASCII letters, digits and underscores"));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for interpolation into SQL text.
    pub(crate) fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl Default for TableName {
    fn default() -> Self {
        Self(DEFAULT_TABLE_NAME.to_string())
    }
}

impl Display for TableName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableName {
    type Err = WarehouseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for TableName {
    type Error = WarehouseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

pub(crate) const TABLE_EXISTS_SQL: &str = "SELECT COUNT(*) FROM information_schema.tables \
     WHERE table_schema = current_schema() AND lower(table_name) = lower(?)";

pub(crate) fn create_table_sql(table: &TableName) -> String {
    format!(
        "CREATE TABLE {table} (
    ismt_idnt VARCHAR NOT NULL,
    ttc BIGINT NOT NULL,
    tta DOUBLE,
    op DOUBLE,
    hi DOUBLE,
    lo DOUBLE,
    ltp DOUBLE,
    arrow VARCHAR,
    indicator VARCHAR,
    lty DOUBLE,
    prev_trad_rate DOUBLE,
    trade_yeild DOUBLE,
    mrkt_indc VARCHAR,
    book_indc VARCHAR,
    download_timestamp TIMESTAMP NOT NULL
)",
        table = table.quoted()
    )
}

pub(crate) fn insert_sql(table: &TableName) -> String {
    let placeholders = COLUMNS
        .iter()
        .map(|column| {
            if *column == "download_timestamp" {
                "CAST(? AS TIMESTAMP)"
            } else {
                "?"
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {table} ({columns}) VALUES ({placeholders})",
        table = table.quoted(),
        columns = COLUMNS.join(", "),
    )
}

pub(crate) fn purge_sql(table: &TableName) -> String {
    format!("DELETE FROM {}", table.quoted())
}

pub(crate) fn distinct_instruments_sql(table: &TableName) -> String {
    format!(
        "SELECT DISTINCT ismt_idnt FROM {} ORDER BY ismt_idnt",
        table.quoted()
    )
}

pub(crate) fn instrument_history_sql(table: &TableName, limit: usize) -> String {
    format!(
        "SELECT {columns} FROM {table} WHERE ismt_idnt = ? ORDER BY download_timestamp LIMIT {limit}",
        columns = COLUMNS.join(", "),
        table = table.quoted(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        assert_eq!(TableName::parse("ccil_securities").unwrap().as_str(), "ccil_securities");
        assert_eq!(TableName::parse("  _Staging2 ").unwrap().as_str(), "_Staging2");
    }

    #[test]
    fn rejects_injection_shaped_names() {
        for bad in ["", "1table", "t; DROP TABLE x", "quotes\"x", "a-b", "naïve"] {
            let error = TableName::parse(bad).expect_err(bad);
            assert!(matches!(error, WarehouseError::InvalidTableName { .. }), "{bad}");
        }
        assert!(TableName::parse(&"t".repeat(65)).is_err());
    }

    #[test]
    fn insert_statement_binds_every_column_in_order() {
        let sql = insert_sql(&TableName::default());
        assert!(sql.starts_with("INSERT INTO \"ccil_securities\" (ismt_idnt, ttc, tta"));
        assert_eq!(sql.matches('?').count(), COLUMNS.len());
        assert!(sql.ends_with("CAST(? AS TIMESTAMP))"));
    }
}
