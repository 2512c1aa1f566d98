use serde::Deserialize;

/// Timeout configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutConfig {
    /// Dial timeout for the forward leg in milliseconds
    /// Default: 5000 (5 seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,
    /// Idle session timeout in milliseconds: a session with no traffic in
    /// either direction for this long is torn down
    /// Default: 600000 (10 minutes)
    #[serde(default = "default_idle_timeout")]
    pub idle_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            idle_ms: default_idle_timeout(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    5_000
}

fn default_idle_timeout() -> u64 {
    600_000
}
