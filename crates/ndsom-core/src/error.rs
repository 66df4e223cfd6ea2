use std::fmt::{Display, Formatter};

use thiserror::Error;

pub use ndsom_warehouse::WarehouseError as PersistenceError;

/// Upstream unreachable, non-success status, or an unreadable body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("upstream returned status {status}: {snippet}")]
    Status { status: u16, snippet: String },

    #[error("malformed JSON body: {0}")]
    MalformedBody(String),
}

/// The envelope does not have the expected shape. Always fatal to a cycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("envelope key '{key}' not found")]
    MissingKey { key: String },

    #[error("envelope key '{key}' holds neither a JSON-encoded string nor an array")]
    UnexpectedValue { key: String },

    #[error("envelope key '{key}' does not contain valid JSON: {message}")]
    InvalidJson { key: String, message: String },

    #[error("envelope key '{key}' does not decode to an array")]
    NotAnArray { key: String },
}

/// One field-level problem found while validating a record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldIssue {
    #[error("field '{field}' is missing")]
    Missing { field: &'static str },

    #[error("field '{field}' must be {expected}, found {found}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("field '{field}' must not be empty")]
    Empty { field: &'static str },

    #[error("field '{field}' is not numeric: '{value}'")]
    NotNumeric { field: &'static str, value: String },

    #[error("field '{field}' is not an integer: '{value}'")]
    NotInteger { field: &'static str, value: String },

    #[error("field '{field}' must be finite")]
    NonFinite { field: &'static str },
}

impl FieldIssue {
    pub const fn field(&self) -> &'static str {
        match self {
            Self::Missing { field }
            | Self::WrongType { field, .. }
            | Self::Empty { field }
            | Self::NotNumeric { field, .. }
            | Self::NotInteger { field, .. }
            | Self::NonFinite { field } => *field,
        }
    }
}

/// A single record failed its shape contract. Isolated; never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Instrument id when the record carried a readable one.
    pub instrument_id: Option<String>,
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn not_an_object(found: &'static str) -> Self {
        Self {
            instrument_id: None,
            issues: vec![FieldIssue::WrongType {
                field: "<record>",
                expected: "a JSON object",
                found,
            }],
        }
    }

    /// Human-readable reason, one clause per issue.
    pub fn reason(&self) -> String {
        self.issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let identity = self.instrument_id.as_deref().unwrap_or("<unknown>");
        write!(f, "record {identity} rejected: {}", self.reason())
    }
}

impl std::error::Error for ValidationError {}

/// Returned when a retried operation has used every attempt.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    operation: &'static str,
    attempts: u32,
    last_error: E,
}

impl<E> RetryExhausted<E> {
    pub fn new(operation: &'static str, attempts: u32, last_error: E) -> Self {
        Self {
            operation,
            attempts,
            last_error,
        }
    }

    pub const fn operation(&self) -> &'static str {
        self.operation
    }

    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> &E {
        &self.last_error
    }

    pub fn into_last_error(self) -> E {
        self.last_error
    }
}

impl<E: Display> Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} failed after {} attempt(s): {}",
            self.operation, self.attempts, self.last_error
        )
    }
}

impl<E> std::error::Error for RetryExhausted<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.last_error)
    }
}

/// Fatal outcome of one ingestion cycle.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transport(#[from] RetryExhausted<TransportError>),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Persistence(#[from] RetryExhausted<PersistenceError>),
}

impl PipelineError {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Schema(_) => "schema",
            Self::Persistence(_) => "persistence",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_reason_lists_every_issue() {
        let error = ValidationError {
            instrument_id: Some("ID123".to_string()),
            issues: vec![
                FieldIssue::NotInteger {
                    field: "ttc",
                    value: "invalid_int".to_string(),
                },
                FieldIssue::Missing { field: "tta" },
            ],
        };

        assert_eq!(
            error.to_string(),
            "record ID123 rejected: field 'ttc' is not an integer: 'invalid_int'; field 'tta' is missing"
        );
    }

    #[test]
    fn exhausted_retry_keeps_the_last_error_as_source() {
        let error = RetryExhausted::new(
            "fetch_raw",
            3,
            TransportError::Status {
                status: 503,
                snippet: String::from("busy"),
            },
        );

        assert_eq!(
            error.to_string(),
            "fetch_raw failed after 3 attempt(s): upstream returned status 503: busy"
        );
        assert!(std::error::Error::source(&error).is_some());
    }
}
