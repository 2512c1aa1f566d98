#![forbid(unsafe_code)]

pub mod metrics;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, Mode};
use crate::error::{ProxyError, Result};
use metrics::ProxyMetrics;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Binds the listener and runs the accept loop until shutdown.
///
/// Each accepted connection gets its own task owning a codec session; errors
/// inside a session are logged and confined to that connection.
pub async fn run(
    config: Arc<Config>,
    counters: Arc<ProxyMetrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let listener = TcpListener::bind(config.listen).await?;
    info!(addr = ?config.listen, mode = ?config.mode, forward = %config.forward, "listener bound");

    // Stop polling the watch channel once its sender is gone, otherwise
    // `changed` resolves immediately forever.
    let mut shutdown_armed = true;
    loop {
        let result = tokio::select! {
            res = listener.accept() => res,
            res = shutdown.changed(), if shutdown_armed => {
                if res.is_ok() {
                    info!("shutdown signal received, stopping accept loop");
                    break;
                } else {
                    // sender dropped; treat as no shutdown signal
                    shutdown_armed = false;
                    continue;
                }
            }
        };
        let (client, addr) = match result {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
                counters.connection_failed();
                continue;
            }
        };
        // connection limit if configured
        if let Some(max) = config.max_connections {
            if counters.active() >= max {
                warn!(%addr, max, "connection limit reached, dropping");
                continue;
            }
        }
        counters.connection_opened();
        debug!(%addr, active = counters.active(), accepted = counters.accepted(), "accepted connection");

        let cfg = config.clone();
        let counters = counters.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            handle_conn(cfg, counters, shutdown, client, addr).await;
        });
    }
    Ok(())
}

async fn handle_conn(
    config: Arc<Config>,
    counters: Arc<ProxyMetrics>,
    shutdown: watch::Receiver<bool>,
    client: TcpStream,
    addr: std::net::SocketAddr,
) {
    let connect_timeout = Duration::from_millis(config.timeouts.connect_ms);
    let upstream = match timeout(connect_timeout, TcpStream::connect(config.forward.as_str())).await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            warn!(%addr, forward = %config.forward, error = %e, "failed to connect forward");
            counters.connection_failed();
            counters.connection_closed();
            return;
        }
        Err(_) => {
            warn!(%addr, forward = %config.forward, "connect timeout");
            counters.connection_failed();
            counters.connection_closed();
            return;
        }
    };

    if config.nodelay {
        if let Err(e) = client.set_nodelay(true).and_then(|()| upstream.set_nodelay(true)) {
            debug!(%addr, error = %e, "failed to set TCP_NODELAY");
        }
    }

    // The codec always sits on the WAN leg: the dialed side when encoding
    // toward the far proxy, the accepted side when decoding from it.
    let (raw, wire) = match config.mode {
        Mode::Encode => (client, upstream),
        Mode::Decode => (upstream, client),
    };

    match session::run(raw, wire, &config, &counters, shutdown).await {
        Ok(()) => {
            if config.telemetry.access_log {
                let snapshot = counters.snapshot();
                info!(%addr, active = snapshot.active, accepted = snapshot.accepted, "connection closed");
            } else {
                debug!(%addr, "connection closed");
            }
        }
        Err(ProxyError::IdleTimeout) => {
            debug!(%addr, "session idle, closing");
        }
        Err(e) => {
            warn!(%addr, error = %e, "session ended with error");
            counters.connection_failed();
        }
    }
    counters.connection_closed();
}
