use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{ProxyError, Result};

/// Reads, parses, and validates a TOML configuration file.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .map_err(|e| ProxyError::Config(format!("cannot read {}: {e}", path.display())))?;
    let cfg = toml::from_str::<Config>(&raw)
        .map_err(|e| ProxyError::Config(format!("{}: {e}", path.display())))?;
    validate_config(&cfg)?;
    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    let (host, port) = cfg
        .forward
        .rsplit_once(':')
        .ok_or_else(|| ProxyError::Config(format!("forward address '{}' is not host:port", cfg.forward)))?;
    if host.is_empty() {
        return Err(ProxyError::Config("forward address has an empty host".into()));
    }
    if port.parse::<u16>().is_err() {
        return Err(ProxyError::Config(format!("forward address has an invalid port '{port}'")));
    }

    if cfg.max_connections == Some(0) {
        return Err(ProxyError::Config("max_connections must be at least 1".into()));
    }
    if cfg.timeouts.connect_ms == 0 {
        return Err(ProxyError::Config("timeouts.connect_ms must be non-zero".into()));
    }
    if cfg.timeouts.idle_ms == 0 {
        return Err(ProxyError::Config("timeouts.idle_ms must be non-zero".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::validate_config;
    use crate::config::{Config, Mode, TelemetryConfig, TimeoutConfig};

    fn base_config() -> Config {
        Config {
            listen: "127.0.0.1:0".parse().expect("valid socket addr"),
            forward: "localhost:3301".into(),
            mode: Mode::Encode,
            nodelay: true,
            max_connections: None,
            timeouts: TimeoutConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    #[test]
    fn accepts_well_formed_config() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn rejects_forward_without_port() {
        let mut cfg = base_config();
        cfg.forward = "localhost".into();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_zero_connection_limit() {
        let mut cfg = base_config();
        cfg.max_connections = Some(0);
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_zero_timeouts() {
        let mut cfg = base_config();
        cfg.timeouts.connect_ms = 0;
        assert!(validate_config(&cfg).is_err());
    }
}
