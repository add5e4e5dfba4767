//! Heartbeat counter with a single-writer, many-reader discipline.
//!
//! # Ownership
//!
//! [`HeartbeatCounter`] is deliberately not `Clone`: whoever owns it (the
//! heartbeat sender) is the only code that can increment.  Everything else
//! gets a [`CounterReader`], which can only load the current value.  Both wrap
//! the same `AtomicU64`, so reads never block the writer and no lock is held
//! across an `.await`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// When a heartbeat is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CountPolicy {
    /// Count every tick, before the connection is attempted.
    #[default]
    Attempts,
    /// Count only ticks where the peer sent a non-empty reply.
    Successes,
}

/// The writable side of the heartbeat counter.
#[derive(Debug, Default)]
pub struct HeartbeatCounter {
    inner: Arc<AtomicU64>,
}

impl HeartbeatCounter {
    /// Creates a counter starting at 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter and returns the new total.
    pub fn record(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Current total.
    pub fn get(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }

    /// Returns a read-only handle sharing this counter.
    pub fn reader(&self) -> CounterReader {
        CounterReader {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Read-only view of a [`HeartbeatCounter`].
#[derive(Debug, Clone)]
pub struct CounterReader {
    inner: Arc<AtomicU64>,
}

impl CounterReader {
    pub fn get(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_starts_at_zero() {
        let counter = HeartbeatCounter::new();
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_record_returns_new_total() {
        let counter = HeartbeatCounter::new();
        assert_eq!(counter.record(), 1);
        assert_eq!(counter.record(), 2);
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_reader_observes_writes() {
        // Arrange
        let counter = HeartbeatCounter::new();
        let reader = counter.reader();

        // Act
        counter.record();
        counter.record();
        counter.record();

        // Assert
        assert_eq!(reader.get(), 3);
        assert_eq!(reader.clone().get(), 3);
    }

    #[test]
    fn test_readers_on_other_threads_see_final_value() {
        let counter = HeartbeatCounter::new();
        let readers: Vec<_> = (0..4).map(|_| counter.reader()).collect();
        for _ in 0..100 {
            counter.record();
        }
        let seen: Vec<u64> = readers
            .into_iter()
            .map(|r| std::thread::spawn(move || r.get()))
            .map(|h| h.join().unwrap())
            .collect();
        assert!(seen.iter().all(|&v| v == 100));
    }

    #[test]
    fn test_count_policy_defaults_to_attempts() {
        assert_eq!(CountPolicy::default(), CountPolicy::Attempts);
    }
}
