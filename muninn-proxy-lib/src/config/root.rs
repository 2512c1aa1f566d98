use serde::Deserialize;
use std::net::SocketAddr;

use super::telemetry::TelemetryConfig;
use super::timeout::TimeoutConfig;

/// Which leg of the connection carries the coded stream.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Accept raw application traffic, dial the far proxy, encode on the
    /// dialed leg. This is the near end of the WAN pair.
    Encode,
    /// Accept coded traffic from the near proxy, dial the origin, decode on
    /// the accepted leg. This is the far end of the WAN pair.
    Decode,
}

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address and port to listen on
    /// Example: "0.0.0.0:3300" or "127.0.0.1:3300"
    pub listen: SocketAddr,
    /// Address dialed for every accepted connection: the far proxy in
    /// encode mode, the origin server in decode mode
    pub forward: String,
    /// Which leg carries the coded stream
    pub mode: Mode,
    /// Set TCP_NODELAY on both legs
    /// Default: true (the codec batches bytes itself; Nagle on top of it
    /// only adds latency)
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,
    /// Upper bound on concurrently open connections (optional)
    #[serde(default)]
    pub max_connections: Option<usize>,
    /// Timeout configuration
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_nodelay() -> bool {
    true
}
