//! Stream encoder: literals out, references in place of repeated chunks.
//!
//! The rolling window slides over every input byte. A window fingerprint
//! that is not yet in the dictionary is inserted on the spot, so the
//! dictionary names every 128-byte substring seen so far and a repeat is
//! found at whatever offset it occurs. When the window equals a known chunk
//! and all of it is still unemitted, the whole window is replaced by a
//! reference. First occurrences always travel as plain bytes; the decoder
//! rolls the same window over its output and learns the same entries at
//! zero wire cost. On top of that, [`StreamChunker`] cuts the emitted
//! literal stream into non-overlapping chunks to feed the positional
//! backref window on both sides.

use bytes::BytesMut;
use tracing::debug;

use super::chunker::StreamChunker;
use super::dictionary::ChunkDictionary;
use super::history::BackrefWindow;
use super::rolling::RollingHash;
use super::{token, Chunk, Fingerprint, CHUNK_LEN};

#[derive(Debug, Default)]
pub struct Encoder {
    dict: ChunkDictionary,
    window: RollingHash,
    /// How many of the window's bytes have not been emitted yet. Falls
    /// behind the window length after a flush; a match may only consume the
    /// window when every byte of it is still unemitted.
    pending: usize,
    chunker: StreamChunker,
    history: BackrefWindow,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes `input`, appending tokens to `out`.
    ///
    /// Up to 127 trailing bytes stay buffered in the window as match
    /// lookahead; call [`flush`](Self::flush) to force them out.
    pub fn encode(&mut self, input: &[u8], out: &mut BytesMut) {
        for &byte in input {
            let evicted = self.window.roll(byte);
            if self.pending == CHUNK_LEN {
                // The window was all lookahead; the byte sliding out goes on
                // the wire now.
                if let Some(lead) = evicted {
                    token::put_literal_byte(out, lead);
                    self.chunker.observe(lead, &mut self.dict, &mut self.history);
                }
            } else {
                self.pending += 1;
            }
            if !self.window.is_primed() {
                continue;
            }
            let fp = self.window.value();
            match self.dict.lookup(fp).map(|chunk| self.window.window_eq(chunk)) {
                Some(true) if self.pending == CHUNK_LEN => {
                    let chunk = self.window.to_chunk();
                    self.emit_reference(fp, &chunk, out);
                }
                // Fingerprint taken by other bytes, or part of the window is
                // already on the wire: keep sliding.
                Some(_) => {}
                None => {
                    let chunk = self.window.to_chunk();
                    self.dict.insert(fp, chunk);
                }
            }
        }
    }

    /// Emits everything still buffered as literals.
    ///
    /// Called at end of stream, and by the proxy after each read burst so
    /// the window lookahead never adds latency. The hash window itself is
    /// untouched, so dictionary coverage and matching continue seamlessly
    /// once enough new bytes arrive.
    pub fn flush(&mut self, out: &mut BytesMut) {
        let (bytes, n) = self.window.tail(self.pending);
        for &byte in &bytes[..n] {
            token::put_literal_byte(out, byte);
            self.chunker.observe(byte, &mut self.dict, &mut self.history);
        }
        self.pending = 0;
    }

    /// Answers a peer ASK: returns the chunk for `fp` and marks it known.
    pub fn learn_for(&mut self, fp: Fingerprint) -> Option<Chunk> {
        let chunk = self.dict.lookup(fp).copied()?;
        self.dict.mark_known(fp);
        Some(chunk)
    }

    pub fn dictionary(&self) -> &ChunkDictionary {
        &self.dict
    }

    fn emit_reference(&mut self, fp: Fingerprint, chunk: &Chunk, out: &mut BytesMut) {
        if let Some(index) = self.history.index_of(fp) {
            token::put_backref(out, index);
        } else if self.dict.known_to_peer(fp) {
            token::put_hashref(out, fp);
        } else {
            debug!(fp = %format_args!("{fp:#018x}"), "declaring chunk outside backref window");
            token::put_declare(out, fp, chunk);
            self.dict.mark_known(fp);
            token::put_hashref(out, fp);
        }
        self.history.push(fp);
        self.window.reset();
        self.pending = 0;
        self.chunker.reset();
    }
}
