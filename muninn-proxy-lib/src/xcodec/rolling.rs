//! Rolling fingerprint over a sliding 128-byte window.
//!
//! A multiplicative Rabin-Karp hash: the fingerprint of a window is the
//! Horner evaluation of its salted bytes in a fixed odd base, wrapping mod
//! 2^64. Advancing by one byte is O(1): subtract the outgoing byte's term,
//! multiply, add the incoming byte. The parameters are compiled in; both
//! ends of a connection compute bit-identical values for the same window,
//! which is what makes the fingerprint usable as a wire-level identifier.

use super::{Fingerprint, CHUNK_LEN};

/// Horner base. Odd, so multiplication by it is invertible mod 2^64.
const MULTIPLIER: u64 = 0x0000_0100_0000_01b3;

/// Added to every byte so that runs of zeros still stir the state.
const SALT: u64 = 0x2f;

/// MULTIPLIER^(CHUNK_LEN - 1), the weight of the oldest byte in the window.
const EVICT_WEIGHT: u64 = wrapping_pow(MULTIPLIER, CHUNK_LEN - 1);

const fn wrapping_pow(base: u64, exp: usize) -> u64 {
    let mut acc = 1u64;
    let mut i = 0;
    while i < exp {
        acc = acc.wrapping_mul(base);
        i += 1;
    }
    acc
}

#[inline]
fn term(byte: u8) -> u64 {
    (byte as u64).wrapping_add(SALT)
}

/// One-shot fingerprint of up to [`CHUNK_LEN`] bytes.
///
/// Equal to the value a [`RollingHash`] reports after rolling the same bytes
/// into an empty window.
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    debug_assert!(bytes.len() <= CHUNK_LEN);
    let mut value = 0u64;
    for &b in bytes {
        value = value.wrapping_mul(MULTIPLIER).wrapping_add(term(b));
    }
    value
}

/// Incremental fingerprint state over the trailing [`CHUNK_LEN`] bytes.
#[derive(Debug, Clone)]
pub struct RollingHash {
    buf: [u8; CHUNK_LEN],
    head: usize,
    len: usize,
    value: u64,
}

impl Default for RollingHash {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingHash {
    pub fn new() -> Self {
        Self { buf: [0u8; CHUNK_LEN], head: 0, len: 0, value: 0 }
    }

    /// Empties the window and zeroes the fingerprint.
    pub fn reset(&mut self) {
        self.head = 0;
        self.len = 0;
        self.value = 0;
    }

    /// Shifts the window by one byte.
    ///
    /// Returns the byte that fell out of the window, if it was already full.
    pub fn roll(&mut self, byte: u8) -> Option<u8> {
        let evicted = if self.len == CHUNK_LEN {
            let out = self.buf[self.head];
            self.value = self.value.wrapping_sub(term(out).wrapping_mul(EVICT_WEIGHT));
            Some(out)
        } else {
            None
        };
        self.value = self.value.wrapping_mul(MULTIPLIER).wrapping_add(term(byte));
        self.buf[self.head] = byte;
        self.head = (self.head + 1) % CHUNK_LEN;
        if self.len < CHUNK_LEN {
            self.len += 1;
        }
        evicted
    }

    /// Current fingerprint. Only a valid dictionary key once [`Self::is_primed`].
    pub fn value(&self) -> Fingerprint {
        self.value
    }

    /// True once the window holds a full [`CHUNK_LEN`] bytes.
    pub fn is_primed(&self) -> bool {
        self.len == CHUNK_LEN
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Compares the window content, oldest byte first, against `chunk`.
    pub fn window_eq(&self, chunk: &[u8; CHUNK_LEN]) -> bool {
        if self.len != CHUNK_LEN {
            return false;
        }
        for (i, &expected) in chunk.iter().enumerate() {
            if self.buf[(self.head + i) % CHUNK_LEN] != expected {
                return false;
            }
        }
        true
    }

    /// Copies the most recent `n` window bytes out in stream order.
    pub fn tail(&self, n: usize) -> ([u8; CHUNK_LEN], usize) {
        debug_assert!(n <= self.len);
        let mut out = [0u8; CHUNK_LEN];
        let start = (self.head + CHUNK_LEN - n) % CHUNK_LEN;
        for (i, slot) in out.iter_mut().enumerate().take(n) {
            *slot = self.buf[(start + i) % CHUNK_LEN];
        }
        (out, n)
    }

    /// Copies the full window out in stream order. Only meaningful once
    /// [`Self::is_primed`].
    pub fn to_chunk(&self) -> [u8; CHUNK_LEN] {
        debug_assert!(self.is_primed());
        self.tail(CHUNK_LEN).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_matches_one_shot_after_priming() {
        let mut hash = RollingHash::new();
        let window: Vec<u8> = (0u8..CHUNK_LEN as u8).collect();
        for &b in &window {
            hash.roll(b);
        }
        assert!(hash.is_primed());
        assert_eq!(hash.value(), fingerprint(&window));
    }

    #[test]
    fn prefix_history_does_not_leak_into_fingerprint() {
        // Two streams ending in the same 128 bytes must report the same
        // fingerprint regardless of what preceded them.
        let tail: Vec<u8> = (0..CHUNK_LEN).map(|i| (i as u8).wrapping_mul(7)).collect();

        let mut a = RollingHash::new();
        for &b in &tail {
            a.roll(b);
        }

        let mut b = RollingHash::new();
        for i in 0..1000u32 {
            b.roll((i % 251) as u8);
        }
        for &byte in &tail {
            b.roll(byte);
        }

        assert_eq!(a.value(), b.value());
    }

    #[test]
    fn roll_reports_evictions_once_full() {
        let mut hash = RollingHash::new();
        for i in 0..CHUNK_LEN {
            assert_eq!(hash.roll(i as u8), None);
        }
        assert_eq!(hash.roll(0xaa), Some(0));
        assert_eq!(hash.roll(0xbb), Some(1));
    }

    #[test]
    fn window_eq_tracks_content() {
        let mut hash = RollingHash::new();
        let chunk: [u8; CHUNK_LEN] = core::array::from_fn(|i| i as u8);
        for &b in &chunk {
            hash.roll(b);
        }
        assert!(hash.window_eq(&chunk));
        hash.roll(0xff);
        assert!(!hash.window_eq(&chunk));
    }

    #[test]
    fn tail_returns_bytes_in_stream_order() {
        let mut hash = RollingHash::new();
        for i in 0..200u8 {
            hash.roll(i);
        }
        // The window holds the trailing 128 of the 200 rolled bytes.
        let (bytes, n) = hash.tail(CHUNK_LEN);
        assert_eq!(n, CHUNK_LEN);
        let expected: Vec<u8> = (72..200).map(|i| i as u8).collect();
        assert_eq!(&bytes[..n], expected.as_slice());
        // A shorter tail is the newest slice of the same window.
        let (bytes, n) = hash.tail(4);
        assert_eq!(&bytes[..n], &[196, 197, 198, 199]);
        // Reading does not disturb the state.
        assert!(hash.is_primed());
        assert_eq!(hash.to_chunk().as_slice(), expected.as_slice());
    }

    #[test]
    fn zero_runs_of_different_lengths_differ() {
        let short = fingerprint(&[0u8; 64]);
        let long = fingerprint(&[0u8; CHUNK_LEN]);
        assert_ne!(short, long);
    }
}
