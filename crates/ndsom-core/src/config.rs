//! Process-wide configuration, resolved once at startup and passed down.

use std::time::Duration;

use ndsom_warehouse::{QueryGuardrails, WarehouseConfig};

use crate::retry::RetryPolicy;

/// NDS-OM market-watch portal resource.
pub const DEFAULT_API_URL: &str = "https://www.ccilindia.com/web/ccil/rbi-nds-om1";

/// Envelope key whose value is the JSON-encoded record array.
pub const DEFAULT_ENVELOPE_KEY: &str = "result1";

pub const DEFAULT_USER_AGENT: &str = concat!("ndsom/", env!("CARGO_PKG_VERSION"));

/// Interval between scheduled ingestion cycles.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

const DEFAULT_PORTLET_PARAMS: [(&str, &str); 5] = [
    (
        "p_p_id",
        "com_ccil_ndsom_entire_CCILNdsOM_EntirePortlet_INSTANCE_zavb",
    ),
    ("p_p_lifecycle", "2"),
    ("p_p_state", "normal"),
    ("p_p_mode", "view"),
    ("p_p_resource_id", "ndsom"),
];

/// Where and how to fetch the upstream payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub base_url: String,
    /// Fixed query parameters identifying the report resource, in order.
    pub params: Vec<(String, String)>,
    pub envelope_key: String,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            params: DEFAULT_PORTLET_PARAMS
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            envelope_key: DEFAULT_ENVELOPE_KEY.to_string(),
            timeout_ms: 10_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Everything one ingestion process needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub endpoint: EndpointConfig,
    pub warehouse: WarehouseConfig,
    pub query_guardrails: QueryGuardrails,
    pub retry: RetryPolicy,
    pub refresh_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            warehouse: WarehouseConfig::default(),
            query_guardrails: QueryGuardrails::default(),
            retry: RetryPolicy::default(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}
