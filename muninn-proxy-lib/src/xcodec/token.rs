//! Wire token framing.
//!
//! The token stream is self-delimiting: four discriminator bytes in the
//! reserved `0xf0..0xf3` range introduce multi-byte tokens, any other byte
//! is a literal, and a stream byte that happens to equal a discriminator is
//! preceded by ESCAPE. Multi-byte fields have fixed, known sizes, so no
//! length prefix is needed.
//!
//! ASK and LEARN ride inside the BACKREF discriminator's index space: index
//! bytes `0xfe` and `0xff` are control frames, leaving 254 addressable
//! back-references. That keeps the reserved byte range at four values and
//! the escape rule untouched.

use bytes::{Buf, BufMut, BytesMut};

use super::error::CodecError;
use super::{Chunk, Fingerprint, CHUNK_LEN};

pub const CHAR_BASE: u8 = 0xf0;
pub const CHAR_MASK: u8 = 0x03;

pub const HASHREF_CHAR: u8 = 0xf0;
pub const ESCAPE_CHAR: u8 = 0xf1;
pub const DECLARE_CHAR: u8 = 0xf2;
pub const BACKREF_CHAR: u8 = 0xf3;

/// Backref index bytes above this value are control frames.
pub const MAX_BACKREF_INDEX: u8 = 0xfd;
pub const BACKREF_OP_ASK: u8 = 0xfe;
pub const BACKREF_OP_LEARN: u8 = 0xff;

const HASHREF_LEN: usize = 1 + 8;
const DECLARE_LEN: usize = 1 + 8 + CHUNK_LEN;
const ASK_LEN: usize = 2 + 8;
const LEARN_LEN: usize = 2 + 8 + CHUNK_LEN;

/// True for the four reserved discriminator bytes.
#[inline]
pub fn is_special(byte: u8) -> bool {
    byte & !CHAR_MASK == CHAR_BASE
}

pub fn put_literal_byte(out: &mut BytesMut, byte: u8) {
    if is_special(byte) {
        out.put_u8(ESCAPE_CHAR);
    }
    out.put_u8(byte);
}

pub fn put_literal(out: &mut BytesMut, bytes: &[u8]) {
    for &b in bytes {
        put_literal_byte(out, b);
    }
}

pub fn put_hashref(out: &mut BytesMut, fp: Fingerprint) {
    out.put_u8(HASHREF_CHAR);
    out.put_u64(fp);
}

pub fn put_declare(out: &mut BytesMut, fp: Fingerprint, chunk: &Chunk) {
    out.put_u8(DECLARE_CHAR);
    out.put_u64(fp);
    out.put_slice(chunk);
}

pub fn put_backref(out: &mut BytesMut, index: u8) {
    debug_assert!(index <= MAX_BACKREF_INDEX);
    out.put_u8(BACKREF_CHAR);
    out.put_u8(index);
}

pub fn put_ask(out: &mut BytesMut, fp: Fingerprint) {
    out.put_u8(BACKREF_CHAR);
    out.put_u8(BACKREF_OP_ASK);
    out.put_u64(fp);
}

pub fn put_learn(out: &mut BytesMut, fp: Fingerprint, chunk: &Chunk) {
    out.put_u8(BACKREF_CHAR);
    out.put_u8(BACKREF_OP_LEARN);
    out.put_u64(fp);
    out.put_slice(chunk);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(u8),
    Hashref(Fingerprint),
    Declare { fp: Fingerprint, chunk: Chunk },
    Backref(u8),
    Ask(Fingerprint),
    Learn { fp: Fingerprint, chunk: Chunk },
}

/// Incremental token parser.
///
/// Input arrives in arbitrary slices; a token whose bytes have not all
/// arrived yet stays buffered until the next push.
#[derive(Debug, Default)]
pub struct TokenReader {
    buf: BytesMut,
}

impl TokenReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, input: &[u8]) {
        self.buf.extend_from_slice(input);
    }

    /// True when no partial token is buffered. Anything else at EOS means
    /// the stream was truncated inside a token.
    pub fn is_drained(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, CodecError> {
        let Some(&discriminator) = self.buf.first() else {
            return Ok(None);
        };
        if !is_special(discriminator) {
            self.buf.advance(1);
            return Ok(Some(Token::Literal(discriminator)));
        }
        match discriminator {
            ESCAPE_CHAR => {
                if self.buf.len() < 2 {
                    return Ok(None);
                }
                let escaped = self.buf[1];
                if !is_special(escaped) {
                    return Err(CodecError::Protocol(format!(
                        "escape before non-reserved byte {escaped:#04x}"
                    )));
                }
                self.buf.advance(2);
                Ok(Some(Token::Literal(escaped)))
            }
            HASHREF_CHAR => {
                if self.buf.len() < HASHREF_LEN {
                    return Ok(None);
                }
                let fp = read_fp(&self.buf[1..]);
                self.buf.advance(HASHREF_LEN);
                Ok(Some(Token::Hashref(fp)))
            }
            DECLARE_CHAR => {
                if self.buf.len() < DECLARE_LEN {
                    return Ok(None);
                }
                let fp = read_fp(&self.buf[1..]);
                let chunk = read_chunk(&self.buf[9..]);
                self.buf.advance(DECLARE_LEN);
                Ok(Some(Token::Declare { fp, chunk }))
            }
            BACKREF_CHAR => {
                if self.buf.len() < 2 {
                    return Ok(None);
                }
                match self.buf[1] {
                    BACKREF_OP_ASK => {
                        if self.buf.len() < ASK_LEN {
                            return Ok(None);
                        }
                        let fp = read_fp(&self.buf[2..]);
                        self.buf.advance(ASK_LEN);
                        Ok(Some(Token::Ask(fp)))
                    }
                    BACKREF_OP_LEARN => {
                        if self.buf.len() < LEARN_LEN {
                            return Ok(None);
                        }
                        let fp = read_fp(&self.buf[2..]);
                        let chunk = read_chunk(&self.buf[10..]);
                        self.buf.advance(LEARN_LEN);
                        Ok(Some(Token::Learn { fp, chunk }))
                    }
                    index => {
                        self.buf.advance(2);
                        Ok(Some(Token::Backref(index)))
                    }
                }
            }
            other => Err(CodecError::Protocol(format!(
                "unknown discriminator {other:#04x}"
            ))),
        }
    }
}

fn read_fp(bytes: &[u8]) -> Fingerprint {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(raw)
}

fn read_chunk(bytes: &[u8]) -> Chunk {
    let mut chunk = [0u8; CHUNK_LEN];
    chunk.copy_from_slice(&bytes[..CHUNK_LEN]);
    chunk
}
