//! Segmentation of the literal stream into backref-window entries.
//!
//! The sliding dictionary probe covers every window offset; what it cannot
//! give the positional BACKREF token is a shared, countable sequence of
//! chunks. Encoder and decoder both run one of these over the bytes that
//! travel as literals: every full non-overlapping 128-byte run is pushed
//! onto the backref window (and kept in the dictionary) at the same stream
//! point on both sides. A partial run is discarded when a reference
//! interrupts it (chunks are contiguous substrings of the stream) and at
//! end of stream.

use tracing::trace;

use super::dictionary::{ChunkDictionary, InsertOutcome};
use super::history::BackrefWindow;
use super::rolling::fingerprint;
use super::{Chunk, CHUNK_LEN};

#[derive(Debug, Default)]
pub(crate) struct StreamChunker {
    pending: Vec<u8>,
}

impl StreamChunker {
    pub fn observe(&mut self, byte: u8, dict: &mut ChunkDictionary, window: &mut BackrefWindow) {
        self.pending.push(byte);
        if self.pending.len() < CHUNK_LEN {
            return;
        }
        let mut chunk: Chunk = [0u8; CHUNK_LEN];
        chunk.copy_from_slice(&self.pending);
        self.pending.clear();
        let fp = fingerprint(&chunk);
        match dict.insert(fp, chunk) {
            InsertOutcome::Inserted | InsertOutcome::Duplicate => window.push(fp),
            InsertOutcome::Collision => {
                trace!(fp = %format_args!("{fp:#018x}"), "dropping chunk with colliding fingerprint");
            }
        }
    }

    /// Discards the partial segment. Called when a reference token breaks
    /// the literal run.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}
