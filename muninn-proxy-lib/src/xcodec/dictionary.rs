//! Fingerprint-to-chunk dictionary, one per codec direction.
//!
//! Entries carry a secondary XXH64 content hash so that a fingerprint
//! collision (same fingerprint, different bytes) is detected rather than
//! silently corrupting the stream. Entries live for the duration of the
//! session; there is no eviction.

use std::collections::HashMap;

use ahash::RandomState;
use xxhash_rust::xxh64::xxh64;

use super::{Chunk, Fingerprint};

const CONTENT_HASH_SEED: u64 = 0x6d76_6e6e;

#[derive(Debug)]
struct Entry {
    bytes: Chunk,
    content_hash: u64,
    known_to_peer: bool,
}

/// Result of [`ChunkDictionary::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Fresh entry stored.
    Inserted,
    /// The identical (fingerprint, chunk) pair was already present.
    Duplicate,
    /// The fingerprint is already bound to different bytes. The entry is
    /// left untouched; the caller must fall back to literals.
    Collision,
}

#[derive(Debug, Default)]
pub struct ChunkDictionary {
    entries: HashMap<Fingerprint, Entry, RandomState>,
}

impl ChunkDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, fp: Fingerprint, bytes: Chunk) -> InsertOutcome {
        let content_hash = xxh64(&bytes, CONTENT_HASH_SEED);
        match self.entries.get(&fp) {
            Some(existing) if existing.content_hash == content_hash && existing.bytes == bytes => {
                InsertOutcome::Duplicate
            }
            Some(_) => InsertOutcome::Collision,
            None => {
                self.entries.insert(fp, Entry { bytes, content_hash, known_to_peer: false });
                InsertOutcome::Inserted
            }
        }
    }

    pub fn lookup(&self, fp: Fingerprint) -> Option<&Chunk> {
        self.entries.get(&fp).map(|e| &e.bytes)
    }

    pub fn contains(&self, fp: Fingerprint) -> bool {
        self.entries.contains_key(&fp)
    }

    /// True once the peer has been taught this entry via DECLARE or LEARN.
    pub fn known_to_peer(&self, fp: Fingerprint) -> bool {
        self.entries.get(&fp).is_some_and(|e| e.known_to_peer)
    }

    pub fn mark_known(&mut self, fp: Fingerprint) {
        if let Some(entry) = self.entries.get_mut(&fp) {
            entry.known_to_peer = true;
        }
    }

    pub fn fingerprints(&self) -> impl Iterator<Item = Fingerprint> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
