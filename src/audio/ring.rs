//! Fixed-capacity ring buffer of audio chunks — the pre-record buffer.
//!
//! When the buffer is full, pushing a new chunk **evicts** the oldest one so
//! the most-recent `capacity` chunks are always available. This matches the
//! retro-capture scenario: at trigger time we want the tail of the ambient
//! audio, not the head.
//!
//! # Example
//!
//! ```rust
//! use stagebox::audio::ChunkRing;
//!
//! let mut ring = ChunkRing::new(2);
//! ring.push(vec![1, 1]);
//! ring.push(vec![2, 2]);
//! ring.push(vec![3, 3]); // capacity 2 → oldest chunk dropped
//! assert_eq!(ring.drain(), vec![2, 2, 3, 3]);
//! ```

use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// ChunkRing
// ---------------------------------------------------------------------------

/// A bounded FIFO of fixed-size sample chunks.
///
/// Chunks are stored whole — eviction happens at chunk granularity, one
/// device read at a time, which keeps the pre-buffer loop allocation-free
/// apart from the chunks themselves.
pub struct ChunkRing {
    chunks: VecDeque<Vec<i16>>,
    capacity: usize,
}

impl ChunkRing {
    /// Create a new ring holding at most `capacity` chunks.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ChunkRing capacity must be > 0");
        Self {
            chunks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `chunk`, evicting the oldest chunk when at capacity.
    pub fn push(&mut self, chunk: Vec<i16>) {
        if self.chunks.len() == self.capacity {
            self.chunks.pop_front();
        }
        self.chunks.push_back(chunk);
    }

    /// Concatenate all retained chunks in insertion order and empty the ring.
    ///
    /// Called exactly once per cycle, when the pre-buffered audio is
    /// prepended to the output file.
    pub fn drain(&mut self) -> Vec<i16> {
        let total: usize = self.chunks.iter().map(Vec::len).sum();
        let mut out = Vec::with_capacity(total);
        for chunk in self.chunks.drain(..) {
            out.extend_from_slice(&chunk);
        }
        out
    }

    /// Number of chunks currently stored.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` when the ring contains no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Maximum number of chunks the ring can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(value: i16) -> Vec<i16> {
        vec![value; 4]
    }

    // ---- Basic push / drain ------------------------------------------------

    #[test]
    fn push_and_drain_within_capacity() {
        let mut ring = ChunkRing::new(8);
        ring.push(chunk(1));
        ring.push(chunk(2));
        assert_eq!(ring.len(), 2);

        let data = ring.drain();
        assert_eq!(data, [vec![1; 4], vec![2; 4]].concat());
        assert!(ring.is_empty());
    }

    #[test]
    fn push_exactly_capacity() {
        let mut ring = ChunkRing::new(3);
        for v in 1..=3 {
            ring.push(chunk(v));
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.drain(), [chunk(1), chunk(2), chunk(3)].concat());
    }

    // ---- Overflow (oldest chunk evicted) -----------------------------------

    #[test]
    fn overflow_by_one_drops_oldest() {
        let mut ring = ChunkRing::new(3);
        for v in 1..=4 {
            ring.push(chunk(v));
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.drain(), [chunk(2), chunk(3), chunk(4)].concat());
    }

    /// For any sequence of pushes exceeding capacity N the ring retains
    /// exactly the last N chunks in original order.
    #[test]
    fn retains_last_n_in_order() {
        let n = 5;
        let mut ring = ChunkRing::new(n);
        for v in 0..37 {
            ring.push(chunk(v));
        }
        assert_eq!(ring.len(), n);

        let expected: Vec<i16> = (32..37).flat_map(chunk).collect();
        assert_eq!(ring.drain(), expected);
    }

    // ---- Drain semantics ---------------------------------------------------

    #[test]
    fn drain_empty_returns_empty_vec() {
        let mut ring = ChunkRing::new(4);
        assert_eq!(ring.drain(), Vec::<i16>::new());
    }

    #[test]
    fn reuse_after_drain() {
        let mut ring = ChunkRing::new(2);
        ring.push(chunk(1));
        let _ = ring.drain();

        ring.push(chunk(9));
        assert_eq!(ring.drain(), chunk(9));
    }

    #[test]
    fn capacity_reported_correctly() {
        let ring = ChunkRing::new(1406);
        assert_eq!(ring.capacity(), 1406);
    }

    // ---- Panic guard -------------------------------------------------------

    #[test]
    #[should_panic(expected = "ChunkRing capacity must be > 0")]
    fn zero_capacity_panics() {
        let _ring = ChunkRing::new(0);
    }
}
