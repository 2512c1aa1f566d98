//! Stream decoder: reverses the encoder and keeps output in input order.
//!
//! The decoder rolls the encoder's sliding window over its own output:
//! every delivered literal advances a mirror hash whose unseen fingerprints
//! are inserted into the dictionary, and the delivered literal stream is
//! cut into the same non-overlapping chunks that feed the encoder's backref
//! window. Output is byte-identical to the encoder's input, so both sides
//! converge on the same dictionary and history without wire traffic. A
//! HASHREF to a fingerprint the decoder does not know opens a blocked
//! segment: everything decoded after it is buffered, an ASK is surfaced to
//! the caller for the return channel, and output resumes in order once a
//! DECLARE or LEARN supplies the chunk.

use bytes::{BufMut, BytesMut};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

use super::chunker::StreamChunker;
use super::dictionary::{ChunkDictionary, InsertOutcome};
use super::error::CodecError;
use super::history::BackrefWindow;
use super::rolling::RollingHash;
use super::token::{Token, TokenReader};
use super::{Chunk, Fingerprint};

/// Peer-protocol work surfaced by [`Decoder::decode`]. The caller owns the
/// return channel and writes the corresponding control tokens to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEvent {
    /// This side met an unknown fingerprint; send ASK upstream.
    Ask(Fingerprint),
    /// The peer asked for a chunk; answer with LEARN from the paired
    /// encoder's dictionary.
    Serve(Fingerprint),
}

#[derive(Debug)]
enum Segment {
    Ready(Vec<u8>),
    Blocked(Fingerprint),
}

#[derive(Debug, Default)]
pub struct Decoder {
    dict: ChunkDictionary,
    reader: TokenReader,
    /// Replays the encoder's sliding window over the delivered stream so
    /// unaligned chunks enter the dictionary on this side too.
    mirror: RollingHash,
    chunker: StreamChunker,
    history: BackrefWindow,
    segments: VecDeque<Segment>,
    pending_asks: HashSet<Fingerprint, ahash::RandomState>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `input`, appending recovered bytes to `out` in strict stream
    /// order. Returns the peer-protocol events the caller must act on.
    pub fn decode(
        &mut self,
        input: &[u8],
        out: &mut BytesMut,
    ) -> Result<Vec<PeerEvent>, CodecError> {
        self.reader.push(input);
        let mut events = Vec::new();
        while let Some(tok) = self.reader.next_token()? {
            match tok {
                Token::Literal(byte) => self.deliver_literal(byte, out),
                Token::Hashref(fp) => self.resolve_reference(fp, out, &mut events),
                Token::Backref(index) => {
                    let Some(fp) = self.history.get(index) else {
                        return Err(CodecError::Protocol(format!(
                            "backref {index} outside window of {}",
                            self.history.len()
                        )));
                    };
                    self.resolve_reference(fp, out, &mut events);
                }
                Token::Declare { fp, chunk } | Token::Learn { fp, chunk } => {
                    self.insert_taught(fp, chunk, out)?;
                }
                Token::Ask(fp) => events.push(PeerEvent::Serve(fp)),
            }
        }
        Ok(events)
    }

    /// End-of-stream check: the token stream must end on a token boundary
    /// and every reference must have been resolved.
    pub fn finish(&self) -> Result<(), CodecError> {
        if !self.reader.is_drained() {
            return Err(CodecError::Truncated);
        }
        for segment in &self.segments {
            if let Segment::Blocked(fp) = segment {
                return Err(CodecError::UnresolvedReference(*fp));
            }
        }
        Ok(())
    }

    /// True while output is held back waiting for a chunk.
    pub fn is_blocked(&self) -> bool {
        !self.segments.is_empty()
    }

    pub fn dictionary(&self) -> &ChunkDictionary {
        &self.dict
    }

    fn deliver_literal(&mut self, byte: u8, out: &mut BytesMut) {
        self.mirror.roll(byte);
        if self.mirror.is_primed() {
            let fp = self.mirror.value();
            if !self.dict.contains(fp) {
                self.dict.insert(fp, self.mirror.to_chunk());
            }
        }
        self.chunker.observe(byte, &mut self.dict, &mut self.history);
        match self.segments.back_mut() {
            None => out.put_u8(byte),
            Some(Segment::Ready(buf)) => buf.push(byte),
            Some(Segment::Blocked(_)) => self.segments.push_back(Segment::Ready(vec![byte])),
        }
    }

    fn deliver_chunk(&mut self, chunk: &Chunk, out: &mut BytesMut) {
        match self.segments.back_mut() {
            None => out.put_slice(chunk),
            Some(Segment::Ready(buf)) => buf.extend_from_slice(chunk),
            Some(Segment::Blocked(_)) => {
                self.segments.push_back(Segment::Ready(chunk.to_vec()));
            }
        }
    }

    fn resolve_reference(
        &mut self,
        fp: Fingerprint,
        out: &mut BytesMut,
        events: &mut Vec<PeerEvent>,
    ) {
        // The encoder consumed its window to emit this reference; the
        // mirror follows suit, and the partial chunk segment can never
        // become a contiguous chunk.
        self.mirror.reset();
        self.chunker.reset();
        self.history.push(fp);
        if let Some(chunk) = self.dict.lookup(fp).copied() {
            self.deliver_chunk(&chunk, out);
        } else {
            debug!(fp = %format_args!("{fp:#018x}"), "blocking on unknown fingerprint");
            if self.pending_asks.insert(fp) {
                events.push(PeerEvent::Ask(fp));
            }
            self.segments.push_back(Segment::Blocked(fp));
        }
    }

    fn insert_taught(
        &mut self,
        fp: Fingerprint,
        chunk: Chunk,
        out: &mut BytesMut,
    ) -> Result<(), CodecError> {
        if self.dict.insert(fp, chunk) == InsertOutcome::Collision {
            return Err(CodecError::Collision(fp));
        }
        self.pending_asks.remove(&fp);
        for segment in self.segments.iter_mut() {
            if matches!(segment, Segment::Blocked(blocked) if *blocked == fp) {
                *segment = Segment::Ready(chunk.to_vec());
            }
        }
        self.drain_ready(out);
        Ok(())
    }

    fn drain_ready(&mut self, out: &mut BytesMut) {
        while let Some(Segment::Ready(_)) = self.segments.front() {
            if let Some(Segment::Ready(buf)) = self.segments.pop_front() {
                out.put_slice(&buf);
            }
        }
    }
}
