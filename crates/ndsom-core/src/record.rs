//! Upstream record shapes and the per-record validator.

use serde::Serialize;
use serde_json::{Map, Value};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use ndsom_warehouse::SecurityRow;

use crate::error::{FieldIssue, ValidationError};

/// Upstream field names, as they appear in the envelope records.
pub mod fields {
    pub const INSTRUMENT_ID: &str = "ismt_idnt";
    pub const TRADE_COUNT: &str = "ttc";
    pub const TRADED_AMOUNT: &str = "tta";
    pub const OPEN_PRICE: &str = "op";
    pub const HIGH_PRICE: &str = "hi";
    pub const LOW_PRICE: &str = "lo";
    pub const LAST_TRADED_PRICE: &str = "ltp";
    pub const TREND_ARROW: &str = "arrow";
    pub const INDICATOR: &str = "indicator";
    pub const LATEST_YIELD: &str = "lty";
    pub const PREVIOUS_TRADE_RATE: &str = "prev_trad_rate";
    pub const TRADE_YIELD: &str = "trade_yeild";
    pub const MARKET_INDICATOR: &str = "mrkt_indc";
    pub const BOOK_INDICATOR: &str = "book_indc";
}

/// One untyped record exactly as received. Lives for a single fetch cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RawRecord(Value);

impl RawRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Best-effort identity for diagnostics, even on malformed records.
    pub fn instrument_id(&self) -> Option<String> {
        match self.0.get(fields::INSTRUMENT_ID)? {
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }
}

impl From<Value> for RawRecord {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// Canonical, fully typed market-statistics record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedRecord {
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
}

impl ValidatedRecord {
    /// Validate a raw record against the full field contract.
    ///
    /// Every field is checked so the rejection lists all problems at once. No
    /// value is returned unless every field passed.
    pub fn from_raw(raw: &RawRecord) -> Result<Self, ValidationError> {
        let Some(object) = raw.as_value().as_object() else {
            return Err(ValidationError::not_an_object(json_kind(raw.as_value())));
        };

        let mut reader = FieldReader::new(object);
        let record = Self {
            instrument_id: reader.identifier(fields::INSTRUMENT_ID),
            trade_count: reader.integer(fields::TRADE_COUNT),
            traded_amount: reader.decimal(fields::TRADED_AMOUNT),
            open_price: reader.decimal(fields::OPEN_PRICE),
            high_price: reader.decimal(fields::HIGH_PRICE),
            low_price: reader.decimal(fields::LOW_PRICE),
            last_traded_price: reader.decimal(fields::LAST_TRADED_PRICE),
            trend_arrow: reader.code(fields::TREND_ARROW),
            indicator: reader.code(fields::INDICATOR),
            latest_yield: reader.decimal(fields::LATEST_YIELD),
            previous_trade_rate: reader.decimal(fields::PREVIOUS_TRADE_RATE),
            trade_yield: reader.decimal(fields::TRADE_YIELD),
            market_indicator: reader.code(fields::MARKET_INDICATOR),
            book_indicator: reader.code(fields::BOOK_INDICATOR),
        };

        if reader.issues.is_empty() {
            Ok(record)
        } else {
            Err(ValidationError {
                instrument_id: raw.instrument_id(),
                issues: reader.issues,
            })
        }
    }
}

/// A validated record stamped with its batch's ingestion time.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestedRow {
    pub record: ValidatedRecord,
    pub download_timestamp: OffsetDateTime,
}

impl IngestedRow {
    pub fn to_security_row(&self) -> Result<SecurityRow, time::error::Format> {
        let record = &self.record;
        Ok(SecurityRow {
            instrument_id: record.instrument_id.clone(),
            trade_count: record.trade_count,
            traded_amount: record.traded_amount,
            open_price: record.open_price,
            high_price: record.high_price,
            low_price: record.low_price,
            last_traded_price: record.last_traded_price,
            trend_arrow: record.trend_arrow.clone(),
            indicator: record.indicator.clone(),
            latest_yield: record.latest_yield,
            previous_trade_rate: record.previous_trade_rate,
            trade_yield: record.trade_yield,
            market_indicator: record.market_indicator.clone(),
            book_indicator: record.book_indicator.clone(),
            download_timestamp: storage_timestamp(self.download_timestamp)?,
        })
    }
}

const STORAGE_TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]");

/// `YYYY-MM-DD HH:MM:SS.ffffff` in UTC, the literal form the table casts.
pub fn storage_timestamp(timestamp: OffsetDateTime) -> Result<String, time::error::Format> {
    timestamp.to_offset(UtcOffset::UTC).format(STORAGE_TIMESTAMP)
}

/// Reads typed fields, collecting issues instead of stopping at the first.
///
/// Failed reads yield a placeholder; callers must discard the assembled value
/// when `issues` is non-empty.
struct FieldReader<'a> {
    object: &'a Map<String, Value>,
    issues: Vec<FieldIssue>,
}

impl<'a> FieldReader<'a> {
    fn new(object: &'a Map<String, Value>) -> Self {
        Self {
            object,
            issues: Vec::new(),
        }
    }

    fn present(&mut self, field: &'static str) -> Option<&'a Value> {
        match self.object.get(field) {
            None | Some(Value::Null) => {
                self.issues.push(FieldIssue::Missing { field });
                None
            }
            Some(value) => Some(value),
        }
    }

    /// Identity must arrive as non-empty text; numbers are a type error here.
    fn identifier(&mut self, field: &'static str) -> String {
        match self.present(field) {
            Some(Value::String(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Some(Value::String(_)) => {
                self.issues.push(FieldIssue::Empty { field });
                String::new()
            }
            Some(other) => {
                self.issues.push(FieldIssue::WrongType {
                    field,
                    expected: "a string",
                    found: json_kind(other),
                });
                String::new()
            }
            None => String::new(),
        }
    }

    /// Short text code. Numbers are accepted and kept as their text.
    fn code(&mut self, field: &'static str) -> String {
        match self.present(field) {
            Some(Value::String(text)) => text.trim().to_string(),
            Some(Value::Number(number)) => number.to_string(),
            Some(other) => {
                self.issues.push(FieldIssue::WrongType {
                    field,
                    expected: "a string",
                    found: json_kind(other),
                });
                String::new()
            }
            None => String::new(),
        }
    }

    fn integer(&mut self, field: &'static str) -> i64 {
        let Some(value) = self.present(field) else {
            return 0;
        };
        match parse_integer(field, value) {
            Ok(parsed) => parsed,
            Err(issue) => {
                self.issues.push(issue);
                0
            }
        }
    }

    fn decimal(&mut self, field: &'static str) -> f64 {
        let Some(value) = self.present(field) else {
            return 0.0;
        };
        match parse_decimal(field, value) {
            Ok(parsed) => parsed,
            Err(issue) => {
                self.issues.push(issue);
                0.0
            }
        }
    }
}

/// Accepts JSON numbers and numeric strings (`"1,234.50"`, `" 7.5 "`).
fn parse_decimal(field: &'static str, value: &Value) -> Result<f64, FieldIssue> {
    let parsed = match value {
        Value::Number(number) => number.as_f64().ok_or(FieldIssue::NonFinite { field })?,
        Value::String(text) => {
            let cleaned = numeric_text(text);
            if cleaned.is_empty() {
                return Err(FieldIssue::Empty { field });
            }
            cleaned.parse::<f64>().map_err(|_| FieldIssue::NotNumeric {
                field,
                value: text.clone(),
            })?
        }
        other => {
            return Err(FieldIssue::WrongType {
                field,
                expected: "a number or numeric string",
                found: json_kind(other),
            })
        }
    };

    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(FieldIssue::NonFinite { field })
    }
}

/// Accepts integers, integral floats and integer strings.
fn parse_integer(field: &'static str, value: &Value) -> Result<i64, FieldIssue> {
    let not_integer = || FieldIssue::NotInteger {
        field,
        value: match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        },
    };

    match value {
        Value::Number(number) => {
            if let Some(parsed) = number.as_i64() {
                return Ok(parsed);
            }
            match number.as_f64() {
                Some(float)
                    if float.fract() == 0.0
                        && float >= i64::MIN as f64
                        && float <= i64::MAX as f64 =>
                {
                    Ok(float as i64)
                }
                _ => Err(not_integer()),
            }
        }
        Value::String(text) => {
            let cleaned = numeric_text(text);
            if cleaned.is_empty() {
                return Err(FieldIssue::Empty { field });
            }
            cleaned.parse::<i64>().map_err(|_| not_integer())
        }
        other => Err(FieldIssue::WrongType {
            field,
            expected: "an integer",
            found: json_kind(other),
        }),
    }
}

fn numeric_text(text: &str) -> String {
    text.trim().chars().filter(|ch| *ch != ',').collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete() -> Value {
        json!({
            "ismt_idnt": "TestID1234",
            "ttc": 1000,
            "tta": 1000.5,
            "op": 99.9,
            "hi": 101.0,
            "lo": 98.5,
            "ltp": 100.0,
            "arrow": "down red",
            "indicator": "G",
            "lty": 7.55,
            "prev_trad_rate": 90.33,
            "trade_yeild": 90.34,
            "mrkt_indc": "CONT",
            "book_indc": "RGLR"
        })
    }

    #[test]
    fn complete_record_validates() {
        let record = ValidatedRecord::from_raw(&RawRecord::new(complete())).expect("valid");
        assert_eq!(record.instrument_id, "TestID1234");
        assert_eq!(record.trade_count, 1000);
        assert_eq!(record.traded_amount, 1000.5);
        assert_eq!(record.trend_arrow, "down red");
        assert_eq!(record.book_indicator, "RGLR");
    }

    #[test]
    fn string_typed_prices_are_normalized() {
        let mut value = complete();
        value["tta"] = json!("1,234.50");
        value["ltp"] = json!(" 100.25 ");
        value["ttc"] = json!("17");
        value["lty"] = json!("7.1");

        let record = ValidatedRecord::from_raw(&RawRecord::new(value)).expect("valid");
        assert_eq!(record.traded_amount, 1234.5);
        assert_eq!(record.last_traded_price, 100.25);
        assert_eq!(record.trade_count, 17);
        assert_eq!(record.latest_yield, 7.1);
    }

    #[test]
    fn integral_float_trade_count_is_accepted() {
        let mut value = complete();
        value["ttc"] = json!(12.0);
        let record = ValidatedRecord::from_raw(&RawRecord::new(value)).expect("valid");
        assert_eq!(record.trade_count, 12);
    }

    #[test]
    fn numeric_codes_are_kept_as_text() {
        let mut value = complete();
        value["indicator"] = json!(7);
        let record = ValidatedRecord::from_raw(&RawRecord::new(value)).expect("valid");
        assert_eq!(record.indicator, "7");
    }

    #[test]
    fn bad_trade_count_is_rejected_with_identity() {
        let raw = RawRecord::new(json!({"ismt_idnt": "ID123", "ttc": "invalid_int"}));
        let error = ValidatedRecord::from_raw(&raw).expect_err("invalid");

        assert_eq!(error.instrument_id.as_deref(), Some("ID123"));
        assert!(error.issues.contains(&FieldIssue::NotInteger {
            field: "ttc",
            value: "invalid_int".to_string()
        }));
        assert!(error.issues.contains(&FieldIssue::Missing { field: "tta" }));
        assert!(error.to_string().starts_with("record ID123 rejected"));
    }

    #[test]
    fn fractional_trade_count_is_rejected() {
        let mut value = complete();
        value["ttc"] = json!(10.5);
        let error = ValidatedRecord::from_raw(&RawRecord::new(value)).expect_err("fractional");
        assert_eq!(error.issues.len(), 1);
        assert_eq!(error.issues[0].field(), "ttc");
    }

    #[test]
    fn empty_instrument_id_is_rejected_once() {
        let mut value = complete();
        value["ismt_idnt"] = json!("   ");
        let error = ValidatedRecord::from_raw(&RawRecord::new(value)).expect_err("empty id");
        assert_eq!(error.issues, vec![FieldIssue::Empty { field: "ismt_idnt" }]);
        assert_eq!(error.instrument_id, None);
    }

    #[test]
    fn numeric_instrument_id_is_rejected_as_wrong_type() {
        let mut value = complete();
        value["ismt_idnt"] = json!(12345);
        let error = ValidatedRecord::from_raw(&RawRecord::new(value)).expect_err("numeric id");
        assert_eq!(
            error.issues,
            vec![FieldIssue::WrongType {
                field: "ismt_idnt",
                expected: "a string",
                found: "a number",
            }]
        );
        assert_eq!(error.instrument_id.as_deref(), Some("12345"));
    }

    #[test]
    fn null_and_wrong_types_are_reported_per_field() {
        let mut value = complete();
        value["op"] = Value::Null;
        value["hi"] = json!(true);
        value["arrow"] = json!(["up"]);
        value["lo"] = json!("n/a");

        let error = ValidatedRecord::from_raw(&RawRecord::new(value)).expect_err("invalid");
        let fields: Vec<_> = error.issues.iter().map(FieldIssue::field).collect();
        assert_eq!(fields, vec!["op", "hi", "lo", "arrow"]);
    }

    #[test]
    fn non_object_records_are_rejected() {
        let error = ValidatedRecord::from_raw(&RawRecord::new(json!([1, 2]))).expect_err("array");
        assert!(error.reason().contains("a JSON object"));
    }

    #[test]
    fn storage_timestamp_is_utc_with_microseconds() {
        let timestamp = OffsetDateTime::from_unix_timestamp_nanos(1_755_831_602_637_123_456)
            .expect("timestamp")
            .to_offset(UtcOffset::from_hms(5, 30, 0).expect("offset"));
        assert_eq!(
            storage_timestamp(timestamp).expect("format"),
            "2025-08-22 03:00:02.637123"
        );
    }

    #[test]
    fn storage_timestamp_pads_whole_seconds() {
        let timestamp = OffsetDateTime::from_unix_timestamp(1_704_067_205).expect("timestamp");
        assert_eq!(
            storage_timestamp(timestamp).expect("format"),
            "2024-01-01 00:00:05.000000"
        );
    }
}
