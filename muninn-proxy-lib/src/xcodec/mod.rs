//! Streaming deduplicating codec.
//!
//! The codec discovers repeated 128-byte chunks in a byte stream with a
//! rolling fingerprint and replaces them with short references. The
//! fingerprint is probed and recorded at every byte offset, so repeats are
//! caught wherever they fall, not just on chunk boundaries. Encoder and
//! decoder each keep a dictionary of every window observed so far and a
//! small window of recently seen chunks for positional back-references; the
//! two converge without per-chunk wire traffic because the decoder rolls
//! the identical window over its reconstructed output (see [`encoder`] and
//! [`decoder`]).
//!
//! Dictionary state that one side is missing is synchronised in-band with
//! DECLARE tokens and the ASK/LEARN request/reply pair carried on the
//! reverse-direction stream of the same connection.

mod chunker;
pub mod decoder;
pub mod dictionary;
pub mod encoder;
mod error;
pub mod history;
pub mod rolling;
pub mod token;

pub use decoder::{Decoder, PeerEvent};
pub use dictionary::{ChunkDictionary, InsertOutcome};
pub use encoder::Encoder;
pub use error::CodecError;
pub use rolling::{fingerprint, RollingHash};

/// Chunk size in bytes. Also the width of the rolling-hash window.
pub const CHUNK_LEN: usize = 128;

/// Number of chunks addressable by a back-reference.
///
/// The backref index byte reserves its two top values for the ASK and LEARN
/// control frames, so the window is 254 entries rather than the full 256.
pub const BACKREF_WINDOW: usize = 254;

/// A chunk of stream content, always exactly [`CHUNK_LEN`] bytes.
pub type Chunk = [u8; CHUNK_LEN];

/// 64-bit rolling-hash fingerprint naming a chunk on the wire.
pub type Fingerprint = u64;
