use serde::Deserialize;
use std::net::SocketAddr;

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelemetryConfig {
    /// Log one line per connection at info level
    /// Default: false (connection closes are logged at debug)
    #[serde(default)]
    pub access_log: bool,
    /// Address for the Prometheus text endpoint (optional)
    /// If provided, counters are served on GET from this address
    /// Default: None (metrics disabled)
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
    /// Log level used when RUST_LOG is not set
    /// Options: "trace", "debug", "info", "warn", "error"
    #[serde(default)]
    pub log_level: Option<String>,
}
