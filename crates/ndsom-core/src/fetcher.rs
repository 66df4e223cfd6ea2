use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::EndpointConfig;
use crate::error::{RetryExhausted, SchemaError, TransportError};
use crate::http_client::{HttpClient, HttpRequest};
use crate::record::RawRecord;
use crate::retry::RetryPolicy;

const SNIPPET_CHARS: usize = 200;

/// Retrieves the upstream envelope and unwraps the record array from it.
pub struct Fetcher {
    http: Arc<dyn HttpClient>,
    endpoint: EndpointConfig,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(http: Arc<dyn HttpClient>, endpoint: EndpointConfig, retry: RetryPolicy) -> Self {
        Self {
            http,
            endpoint,
            retry,
        }
    }

    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    /// The GET issued on every attempt.
    pub fn request(&self) -> HttpRequest {
        HttpRequest::get(self.endpoint.base_url.as_str())
            .with_query(
                self.endpoint
                    .params
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str())),
            )
            .with_header("accept", "application/json")
            .with_timeout_ms(self.endpoint.timeout_ms)
    }

    /// Fetch the raw JSON payload, retried under the configured policy.
    pub async fn fetch_raw(&self) -> Result<Value, RetryExhausted<TransportError>> {
        self.retry.run("fetch_raw", || self.fetch_once()).await
    }

    /// Extract the records from an envelope. Never retried.
    pub fn parse_envelope(&self, payload: &Value) -> Result<Vec<RawRecord>, SchemaError> {
        parse_envelope(payload, &self.endpoint.envelope_key)
    }

    async fn fetch_once(&self) -> Result<Value, TransportError> {
        let request = self.request();
        debug!(url = %request.url, timeout_ms = request.timeout_ms, "requesting upstream payload");

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|error| TransportError::Request(error.to_string()))?;

        if !response.is_success() {
            return Err(TransportError::Status {
                status: response.status,
                snippet: snippet(&response.body),
            });
        }

        let payload = serde_json::from_str::<Value>(&response.body)
            .map_err(|error| TransportError::MalformedBody(error.to_string()))?;
        info!(bytes = response.body.len(), "fetched upstream payload");
        Ok(payload)
    }
}

/// Unwrap the record array held under `key`.
///
/// The upstream encodes the array as a JSON string inside the envelope; a
/// plain array under the same key is accepted as well. Elements are returned
/// as-is, so a non-object element becomes a per-record rejection later rather
/// than failing the envelope.
pub fn parse_envelope(payload: &Value, key: &str) -> Result<Vec<RawRecord>, SchemaError> {
    let envelope = payload.as_object().ok_or(SchemaError::NotAnObject)?;
    let inner = envelope.get(key).ok_or_else(|| SchemaError::MissingKey {
        key: key.to_string(),
    })?;

    let decoded;
    let array = match inner {
        Value::Array(items) => items,
        Value::String(encoded) => {
            decoded = serde_json::from_str::<Value>(encoded).map_err(|error| {
                SchemaError::InvalidJson {
                    key: key.to_string(),
                    message: error.to_string(),
                }
            })?;
            decoded.as_array().ok_or_else(|| SchemaError::NotAnArray {
                key: key.to_string(),
            })?
        }
        _ => {
            return Err(SchemaError::UnexpectedValue {
                key: key.to_string(),
            })
        }
    };

    Ok(array.iter().cloned().map(RawRecord::new).collect())
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    let mut out: String = trimmed.chars().take(SNIPPET_CHARS).collect();
    if trimmed.chars().count() > SNIPPET_CHARS {
        out.push_str("...");
    }
    out
}
