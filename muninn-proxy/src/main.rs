#![forbid(unsafe_code)]

use clap::Parser;
use muninn_proxy_lib::config::load_from_path;
use muninn_proxy_lib::proxy;
use muninn_proxy_lib::proxy::metrics::ProxyMetrics;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const METRICS_PREFIX: &str = "muninn";

#[derive(Parser, Debug)]
#[command(author, version, about = "Muninn WAN-optimization proxy (deduplicating codec)")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "MUNINN_CONFIG",
        default_value = "config/encode.toml"
    )]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match load_from_path(&cli.config) {
        Ok(cfg) => {
            init_tracing(cfg.telemetry.log_level.as_deref());
            info!(?cfg.listen, mode = ?cfg.mode, forward = %cfg.forward, "configuration loaded");
            let cfg = Arc::new(cfg);
            let counters = Arc::new(ProxyMetrics::default());

            if let Some(addr) = cfg.telemetry.metrics_addr {
                let counters = counters.clone();
                tokio::spawn(async move {
                    if let Err(err) = proxy::metrics::serve_metrics(addr, counters, METRICS_PREFIX).await {
                        error!(%err, "metrics endpoint exited");
                    }
                });
            }

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("interrupt received, shutting down");
                let _ = shutdown_tx.send(true);
            });

            if let Err(err) = proxy::run(cfg, counters, shutdown_rx).await {
                error!(%err, "proxy exited with error");
                std::process::exit(1);
            }
        }
        Err(err) => {
            init_tracing(None);
            error!(%err, "failed to load configuration");
            std::process::exit(1);
        }
    }
}

fn init_tracing(fallback_level: Option<&str>) {
    let default = fallback_level.unwrap_or("info");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
