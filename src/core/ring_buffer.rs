//! Fixed-capacity ring buffer backing the engine's input accumulators.

use crate::core::types::Sample;

/// Fixed-capacity sample ring.
///
/// The buffer never allocates after construction and never shifts memory,
/// which is what keeps the streaming engine's memory bounded by the window
/// geometry instead of the total stream length. Reads happen from the front
/// (oldest samples) and writes append at the back.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Vec<Sample>,
    head: usize,
    len: usize,
}

impl RingBuffer {
    /// Creates a ring buffer with fixed capacity.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            data: vec![0.0; cap],
            head: 0,
            len: 0,
        }
    }

    /// Returns the number of samples currently stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns the fixed capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns available free space.
    #[inline]
    pub fn available(&self) -> usize {
        self.capacity() - self.len
    }

    /// Returns true when no samples are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clears the ring buffer.
    #[inline]
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Appends as many samples as fit from `input`.
    ///
    /// Returns the number of samples appended.
    pub fn push_slice(&mut self, input: &[Sample]) -> usize {
        if input.is_empty() || self.available() == 0 {
            return 0;
        }
        let to_push = input.len().min(self.available());
        let tail = (self.head + self.len) % self.capacity();
        let first = to_push.min(self.capacity() - tail);
        self.data[tail..tail + first].copy_from_slice(&input[..first]);
        let second = to_push - first;
        if second > 0 {
            self.data[..second].copy_from_slice(&input[first..first + second]);
        }
        self.len += to_push;
        to_push
    }

    /// Copies samples from the front into `out` without removing them.
    ///
    /// Returns the number of copied samples.
    pub fn peek_slice(&self, out: &mut [Sample]) -> usize {
        let to_copy = out.len().min(self.len);
        if to_copy == 0 {
            return 0;
        }
        let first = to_copy.min(self.capacity() - self.head);
        out[..first].copy_from_slice(&self.data[self.head..self.head + first]);
        let second = to_copy - first;
        if second > 0 {
            out[first..first + second].copy_from_slice(&self.data[..second]);
        }
        to_copy
    }

    /// Discards up to `n` samples from the front.
    ///
    /// Returns the number of samples discarded.
    pub fn discard(&mut self, n: usize) -> usize {
        let to_drop = n.min(self.len);
        if to_drop == 0 {
            return 0;
        }
        self.head = (self.head + to_drop) % self.capacity();
        self.len -= to_drop;
        if self.len == 0 {
            self.head = 0;
        }
        to_drop
    }
}
