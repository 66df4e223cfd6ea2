use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::record::{IngestedRow, RawRecord, ValidatedRecord};

/// A record that failed validation, kept with its reason for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub record: RawRecord,
    pub instrument_id: Option<String>,
    pub reason: String,
    #[serde(skip)]
    pub error: ValidationError,
}

impl Rejection {
    fn new(record: RawRecord, error: ValidationError) -> Self {
        Self {
            instrument_id: error.instrument_id.clone(),
            reason: error.reason(),
            record,
            error,
        }
    }
}

/// Rows accepted from one fetch, all sharing one ingestion timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub rows: Vec<IngestedRow>,
    pub rejections: Vec<Rejection>,
    pub download_timestamp: OffsetDateTime,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Validates every record independently; one bad record never aborts the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transformer;

impl Transformer {
    pub fn new() -> Self {
        Self
    }

    /// Validate and stamp with the current UTC time, read once for the batch.
    pub fn validate_and_transform(&self, records: Vec<RawRecord>) -> Batch {
        self.validate_and_transform_at(records, OffsetDateTime::now_utc())
    }

    /// Same as [`Transformer::validate_and_transform`] with a caller-supplied
    /// timestamp. Precision is truncated to microseconds, the storage unit.
    pub fn validate_and_transform_at(
        &self,
        records: Vec<RawRecord>,
        timestamp: OffsetDateTime,
    ) -> Batch {
        let download_timestamp = truncate_to_micros(timestamp);
        let mut rows = Vec::with_capacity(records.len());
        let mut rejections = Vec::new();

        for record in records {
            match ValidatedRecord::from_raw(&record) {
                Ok(validated) => rows.push(IngestedRow {
                    record: validated,
                    download_timestamp,
                }),
                Err(error) => {
                    let rejection = Rejection::new(record, error);
                    warn!(
                        instrument_id = rejection.instrument_id.as_deref().unwrap_or("<unknown>"),
                        reason = %rejection.reason,
                        "rejected record"
                    );
                    rejections.push(rejection);
                }
            }
        }

        debug!(accepted = rows.len(), rejected = rejections.len(), "transformed batch");
        Batch {
            rows,
            rejections,
            download_timestamp,
        }
    }
}

fn truncate_to_micros(timestamp: OffsetDateTime) -> OffsetDateTime {
    let micros = timestamp.microsecond();
    timestamp.replace_microsecond(micros).unwrap_or(timestamp)
}
