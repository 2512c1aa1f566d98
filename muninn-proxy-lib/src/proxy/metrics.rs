#![forbid(unsafe_code)]

//! Process-wide counters and their Prometheus text endpoint.

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tracing::info;

/// Counters shared by the accept loop and all sessions. Connection state
/// and codec byte totals live side by side: the coded/raw ratio is the
/// live measure of what the dictionary is saving on the WAN leg.
#[derive(Debug, Default)]
pub struct ProxyMetrics {
    active_connections: AtomicUsize,
    accepted_connections: AtomicU64,
    connection_errors: AtomicU64,
    raw_bytes: AtomicU64,
    coded_bytes: AtomicU64,
}

/// Point-in-time view of [`ProxyMetrics`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub active: usize,
    pub accepted: u64,
    pub errors: u64,
    pub raw_bytes: u64,
    pub coded_bytes: u64,
}

impl MetricsSnapshot {
    /// Coded-to-raw byte ratio; 1.0 before any traffic.
    pub fn coded_ratio(&self) -> f64 {
        if self.raw_bytes == 0 {
            1.0
        } else {
            self.coded_bytes as f64 / self.raw_bytes as f64
        }
    }
}

impl ProxyMetrics {
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.accepted_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero rather than wrapping if close is ever overcounted.
    pub fn connection_closed(&self) {
        let mut active = self.active_connections.load(Ordering::Relaxed);
        while active > 0 {
            match self.active_connections.compare_exchange_weak(
                active,
                active - 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => active = observed,
            }
        }
    }

    pub fn connection_failed(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_raw(&self, bytes: u64) {
        self.raw_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_coded(&self, bytes: u64) {
        self.coded_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn active(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn accepted(&self) -> u64 {
        self.accepted_connections.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active: self.active(),
            accepted: self.accepted(),
            errors: self.connection_errors.load(Ordering::Relaxed),
            raw_bytes: self.raw_bytes.load(Ordering::Relaxed),
            coded_bytes: self.coded_bytes.load(Ordering::Relaxed),
        }
    }

    /// Render counters in Prometheus exposition text format.
    pub fn render_prometheus(&self, prefix: &str) -> String {
        let snap = self.snapshot();
        let mut text = String::with_capacity(1024);
        series(&mut text, prefix, "connections_active", "gauge",
               "Active proxied connections", snap.active as u64);
        series(&mut text, prefix, "connections_total", "counter",
               "Total connections accepted", snap.accepted);
        series(&mut text, prefix, "connections_errors_total", "counter",
               "Total connection errors", snap.errors);
        series(&mut text, prefix, "raw_bytes_total", "counter",
               "Raw bytes consumed by the encoder", snap.raw_bytes);
        series(&mut text, prefix, "coded_bytes_total", "counter",
               "Coded bytes written to the wire", snap.coded_bytes);
        let _ = writeln!(text, "# HELP {prefix}_coded_ratio Coded-to-raw byte ratio since start");
        let _ = writeln!(text, "# TYPE {prefix}_coded_ratio gauge");
        let _ = writeln!(text, "{prefix}_coded_ratio {}", snap.coded_ratio());
        text
    }
}

fn series(text: &mut String, prefix: &str, name: &str, kind: &str, help: &str, value: u64) {
    let _ = writeln!(text, "# HELP {prefix}_{name} {help}");
    let _ = writeln!(text, "# TYPE {prefix}_{name} {kind}");
    let _ = writeln!(text, "{prefix}_{name} {value}");
}

pub async fn serve_metrics(
    addr: SocketAddr,
    metrics: Arc<ProxyMetrics>,
    prefix: &str,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "metrics endpoint listening");
    loop {
        let (mut stream, _peer) = listener.accept().await?;
        let metrics = metrics.clone();
        let prefix = prefix.to_string();
        tokio::spawn(async move {
            let body = metrics.render_prometheus(&prefix);
            let header = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/plain; version=0.0.4\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            if stream.write_all(header.as_bytes()).await.is_ok() {
                let _ = stream.write_all(body.as_bytes()).await;
            }
            let _ = stream.shutdown().await;
        });
    }
}
