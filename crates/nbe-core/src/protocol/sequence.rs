//! Sequence number allocation.
//!
//! The wire carries only two decimal digits of sequence number, so the
//! counter itself is a `u64` that never repeats and the wire value is derived
//! from it with [`wire_seq_no`].  The full counter value doubles as a unique
//! ticket for the caller that allocated it: two callers may briefly share a
//! wire number after 100 allocations, but never a ticket.
//!
//! # Thread safety
//!
//! The counter uses `AtomicU64`, so any number of tasks can allocate at the
//! same time without a lock and without ever receiving the same value.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::protocol::messages::SEQ_NO_MODULUS;

/// A thread-safe, monotonically increasing counter.
///
/// # Examples
///
/// ```rust
/// use nbe_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// ```
#[derive(Debug)]
pub struct SequenceCounter {
    inner: AtomicU64,
}

impl SequenceCounter {
    /// Creates a new counter starting at 0.
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(0),
        }
    }

    /// Returns the next value and atomically advances the counter.
    ///
    /// `Relaxed` is enough: the value orders nothing but itself.
    pub fn next(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the value the next call to [`next`](Self::next) will hand out.
    pub fn current(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a counter value onto the two-digit wire field.
pub fn wire_seq_no(ticket: u64) -> u8 {
    (ticket % SEQ_NO_MODULUS) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sequence_counter_starts_at_zero() {
        let counter = SequenceCounter::new();
        assert_eq!(counter.next(), 0);
    }

    #[test]
    fn test_sequence_counter_increments_monotonically() {
        // Arrange
        let counter = SequenceCounter::new();

        // Act
        let values: Vec<u64> = (0..250).map(|_| counter.next()).collect();

        // Assert
        for window in values.windows(2) {
            assert!(window[1] > window[0], "values must strictly increase");
        }
    }

    #[test]
    fn test_sequence_counter_is_thread_safe() {
        // Arrange
        let counter = Arc::new(SequenceCounter::new());

        // Act
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = Arc::clone(&counter);
                thread::spawn(move || (0..500).map(|_| c.next()).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread panicked"))
            .collect();

        // Assert
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 8 * 500, "every value must be unique");
    }

    #[test]
    fn test_current_does_not_increment() {
        let counter = SequenceCounter::new();
        counter.next();

        assert_eq!(counter.current(), 1);
        assert_eq!(counter.next(), 1);
    }

    #[test]
    fn test_wire_seq_no_wraps_at_one_hundred() {
        assert_eq!(wire_seq_no(0), 0);
        assert_eq!(wire_seq_no(99), 99);
        assert_eq!(wire_seq_no(100), 0);
        assert_eq!(wire_seq_no(12_345), 45);
    }
}
