#![forbid(unsafe_code)]

//! One codec session: a raw leg, a wire leg, an encoder and a decoder.
//!
//! The whole session runs on one task; encoding and decoding are synchronous
//! transformations and the only suspension points are the socket reads and
//! writes. An unwritable socket therefore stalls the direction feeding it,
//! which is the intended backpressure.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::config::Config;
use crate::error::{ProxyError, Result};
use crate::proxy::metrics::ProxyMetrics;
use crate::xcodec::{token, CodecError, Decoder, Encoder, PeerEvent};

const READ_BUF_LEN: usize = 16 * 1024;

/// Pumps both directions until EOF on each side, shutdown, or an error.
pub async fn run(
    raw: TcpStream,
    wire: TcpStream,
    config: &Config,
    counters: &ProxyMetrics,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let idle = Duration::from_millis(config.timeouts.idle_ms);
    let (mut raw_rd, mut raw_wr) = raw.into_split();
    let (mut wire_rd, mut wire_wr) = wire.into_split();

    let mut encoder = Encoder::new();
    let mut decoder = Decoder::new();

    let mut raw_buf = vec![0u8; READ_BUF_LEN];
    let mut wire_buf = vec![0u8; READ_BUF_LEN];
    let mut coded = BytesMut::with_capacity(2 * READ_BUF_LEN);
    let mut plain = BytesMut::with_capacity(2 * READ_BUF_LEN);

    let mut raw_open = true;
    let mut wire_open = true;
    // Stop polling the watch channel once its sender is gone, otherwise
    // `changed` resolves immediately forever.
    let mut shutdown_armed = true;

    while raw_open || wire_open {
        tokio::select! {
            res = raw_rd.read(&mut raw_buf), if raw_open => match res? {
                0 => {
                    encoder.flush(&mut coded);
                    if !coded.is_empty() {
                        counters.record_coded(coded.len() as u64);
                        wire_wr.write_all(&coded).await?;
                        coded.clear();
                    }
                    wire_wr.shutdown().await?;
                    raw_open = false;
                    trace!("raw side closed, wire write half-closed");
                }
                n => {
                    counters.record_raw(n as u64);
                    encoder.encode(&raw_buf[..n], &mut coded);
                    // Flushing per burst trades a little dedup at burst
                    // boundaries for zero added latency.
                    encoder.flush(&mut coded);
                    counters.record_coded(coded.len() as u64);
                    wire_wr.write_all(&coded).await?;
                    coded.clear();
                }
            },
            res = wire_rd.read(&mut wire_buf), if wire_open => match res? {
                0 => {
                    decoder.finish()?;
                    raw_wr.shutdown().await?;
                    wire_open = false;
                    trace!("wire side closed, raw write half-closed");
                }
                n => {
                    let events = decoder.decode(&wire_buf[..n], &mut plain)?;
                    if !events.is_empty() {
                        for event in events {
                            match event {
                                PeerEvent::Ask(fp) => {
                                    debug!(fp = %format_args!("{fp:#018x}"), "asking peer for chunk");
                                    token::put_ask(&mut coded, fp);
                                }
                                PeerEvent::Serve(fp) => match encoder.learn_for(fp) {
                                    Some(chunk) => {
                                        debug!(fp = %format_args!("{fp:#018x}"), "answering peer ask");
                                        token::put_learn(&mut coded, fp, &chunk);
                                    }
                                    None => {
                                        return Err(CodecError::Protocol(format!(
                                            "peer asked for unknown fingerprint {fp:#018x}"
                                        ))
                                        .into());
                                    }
                                },
                            }
                        }
                        counters.record_coded(coded.len() as u64);
                        wire_wr.write_all(&coded).await?;
                        coded.clear();
                    }
                    if !plain.is_empty() {
                        raw_wr.write_all(&plain).await?;
                        plain.clear();
                    }
                }
            },
            res = shutdown.changed(), if shutdown_armed => {
                if res.is_ok() {
                    debug!("session cancelled by shutdown signal");
                    return Ok(());
                }
                shutdown_armed = false;
            }
            () = sleep(idle) => return Err(ProxyError::IdleTimeout),
        }
    }
    Ok(())
}
