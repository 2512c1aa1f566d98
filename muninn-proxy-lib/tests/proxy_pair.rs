//! End-to-end test over real sockets: an encode-mode proxy and a
//! decode-mode proxy bracket a loopback "WAN" link, with an echo server as
//! the origin. Application bytes must come back unchanged, and the wire leg
//! must carry fewer bytes than the raw leg once the stream repeats itself.

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::Duration;

use muninn_proxy_lib::config::{Config, Mode, TelemetryConfig, TimeoutConfig};
use muninn_proxy_lib::proxy;
use muninn_proxy_lib::proxy::metrics::ProxyMetrics;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::sleep;

type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

fn pick_free_port() -> TestResult<SocketAddr> {
    let listener = StdTcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

async fn spawn_echo_server() -> TestResult<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                continue;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });
    Ok(addr)
}

fn make_config(listen: SocketAddr, forward: String, mode: Mode) -> Config {
    Config {
        listen,
        forward,
        mode,
        nodelay: true,
        max_connections: None,
        timeouts: TimeoutConfig { connect_ms: 1_000, idle_ms: 10_000 },
        telemetry: TelemetryConfig::default(),
    }
}

struct ProxyPair {
    encode_addr: SocketAddr,
    encode_metrics: Arc<ProxyMetrics>,
    _shutdown: watch::Sender<bool>,
}

async fn spawn_proxy_pair() -> TestResult<ProxyPair> {
    let origin = spawn_echo_server().await?;
    let decode_addr = pick_free_port()?;
    let encode_addr = pick_free_port()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let encode_metrics = Arc::new(ProxyMetrics::default());
    let decode_metrics = Arc::new(ProxyMetrics::default());

    let decode_cfg = Arc::new(make_config(decode_addr, origin.to_string(), Mode::Decode));
    let encode_cfg = Arc::new(make_config(encode_addr, decode_addr.to_string(), Mode::Encode));

    tokio::spawn({
        let rx = shutdown_rx.clone();
        let metrics = decode_metrics;
        async move { proxy::run(decode_cfg, metrics, rx).await }
    });
    tokio::spawn({
        let rx = shutdown_rx;
        let metrics = encode_metrics.clone();
        async move { proxy::run(encode_cfg, metrics, rx).await }
    });

    // Give both proxies a moment to bind.
    sleep(Duration::from_millis(100)).await;

    Ok(ProxyPair { encode_addr, encode_metrics, _shutdown: shutdown_tx })
}

/// 24 KiB with internal repetition and all four reserved bytes present.
fn test_payload() -> Vec<u8> {
    let block: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();
    let mut payload = Vec::new();
    for _ in 0..12 {
        payload.extend_from_slice(&block);
    }
    payload.extend_from_slice(b"end-of-payload");
    payload
}

#[tokio::test]
async fn pair_round_trips_application_bytes() -> TestResult<()> {
    let pair = spawn_proxy_pair().await?;
    let payload = test_payload();

    let mut client = TcpStream::connect(pair.encode_addr).await?;
    client.write_all(&payload).await?;
    let mut echoed = vec![0u8; payload.len()];
    client.read_exact(&mut echoed).await?;
    assert_eq!(echoed, payload, "first pass must round trip");

    // Second pass re-sends the same bytes: the dictionary built on pass one
    // turns almost all of it into references.
    client.write_all(&payload).await?;
    client.read_exact(&mut echoed).await?;
    assert_eq!(echoed, payload, "second pass must round trip");

    let snapshot = pair.encode_metrics.snapshot();
    assert!(snapshot.raw_bytes >= 2 * payload.len() as u64, "raw counter sees both passes");
    assert!(
        snapshot.coded_bytes < snapshot.raw_bytes,
        "repetition must shrink the wire leg ({} vs {})",
        snapshot.coded_bytes,
        snapshot.raw_bytes
    );
    Ok(())
}

#[tokio::test]
async fn pair_handles_many_sequential_connections() -> TestResult<()> {
    let pair = spawn_proxy_pair().await?;
    for i in 0..5u8 {
        let mut client = TcpStream::connect(pair.encode_addr).await?;
        let msg = format!("hello from connection {i}");
        client.write_all(msg.as_bytes()).await?;
        let mut echoed = vec![0u8; msg.len()];
        client.read_exact(&mut echoed).await?;
        assert_eq!(echoed, msg.as_bytes());
    }
    assert_eq!(pair.encode_metrics.accepted(), 5);
    Ok(())
}

#[tokio::test]
async fn shutdown_stops_accept_loop() -> TestResult<()> {
    let listen = pick_free_port()?;
    let cfg = Arc::new(make_config(listen, "127.0.0.1:1".into(), Mode::Encode));
    let metrics = Arc::new(ProxyMetrics::default());
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn(proxy::run(cfg, metrics, rx));
    sleep(Duration::from_millis(50)).await;
    tx.send(true)?;
    let result = handle.await?;
    assert!(result.is_ok(), "orderly shutdown is not an error");
    Ok(())
}
