use thiserror::Error;

use super::Fingerprint;

/// Errors raised by the codec. All of them are fatal for the connection
/// that produced them; other connections are unaffected.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Malformed token stream: bad discriminator, bad escape operand, a
    /// back-reference outside the window, or an ASK for a fingerprint this
    /// side never produced.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A DECLARE or LEARN tried to bind a fingerprint to different bytes
    /// than the dictionary already holds.
    #[error("fingerprint collision on {0:#018x}")]
    Collision(Fingerprint),

    /// The stream ended while a reference was still waiting for its chunk.
    #[error("unresolved reference to {0:#018x} at end of stream")]
    UnresolvedReference(Fingerprint),

    /// The stream ended in the middle of a token.
    #[error("stream truncated inside a token")]
    Truncated,
}
