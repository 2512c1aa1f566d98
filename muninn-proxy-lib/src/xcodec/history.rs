//! Ring of recently observed chunks, addressed by position for BACKREF.

use std::collections::VecDeque;

use super::{Fingerprint, BACKREF_WINDOW};

/// The last [`BACKREF_WINDOW`] chunk fingerprints seen in stream order.
/// Index 0 is the most recent. Encoder and decoder push at the same stream
/// positions, so an index chosen on one side resolves to the same chunk on
/// the other.
#[derive(Debug, Default)]
pub struct BackrefWindow {
    ring: VecDeque<Fingerprint>,
}

impl BackrefWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fp: Fingerprint) {
        if self.ring.len() == BACKREF_WINDOW {
            self.ring.pop_back();
        }
        self.ring.push_front(fp);
    }

    /// Position of the most recent occurrence of `fp`, if still in range.
    pub fn index_of(&self, fp: Fingerprint) -> Option<u8> {
        self.ring.iter().position(|&f| f == fp).map(|i| i as u8)
    }

    pub fn get(&self, index: u8) -> Option<Fingerprint> {
        self.ring.get(index as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_recent_is_index_zero() {
        let mut window = BackrefWindow::new();
        window.push(10);
        window.push(20);
        assert_eq!(window.index_of(20), Some(0));
        assert_eq!(window.index_of(10), Some(1));
        assert_eq!(window.get(1), Some(10));
    }

    #[test]
    fn old_entries_fall_off_the_back() {
        let mut window = BackrefWindow::new();
        for fp in 0..(BACKREF_WINDOW as u64 + 10) {
            window.push(fp);
        }
        assert_eq!(window.len(), BACKREF_WINDOW);
        assert_eq!(window.index_of(0), None);
        assert_eq!(window.index_of(9), None);
        assert_eq!(window.index_of(10), Some((BACKREF_WINDOW - 1) as u8));
    }

    #[test]
    fn repeated_fingerprint_resolves_to_most_recent() {
        let mut window = BackrefWindow::new();
        window.push(7);
        window.push(8);
        window.push(7);
        assert_eq!(window.index_of(7), Some(0));
    }
}
