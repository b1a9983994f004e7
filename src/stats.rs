//! Per-channel runtime statistics.
//!
//! One [`ChannelStats`] is shared by a channel's producer and consumer via
//! `Arc`. All counters are relaxed atomics: they are monotonically increasing
//! tallies with no ordering relationship to the data path, read only for
//! reporting.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters for one channel.
#[derive(Debug, Default)]
pub struct ChannelStats {
    samples_produced: AtomicU64,
    samples_dropped: AtomicU64,
    samples_persisted: AtomicU64,
    batches_written: AtomicU64,
    overflow_episodes: AtomicU64,
    sink_errors: AtomicU64,
}

/// Point-in-time copy of a channel's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Samples the producer successfully appended to the buffer.
    pub samples_produced: u64,
    /// Samples rejected by a full buffer and discarded.
    pub samples_dropped: u64,
    /// Samples delivered to the sink by the consumer.
    pub samples_persisted: u64,
    /// Batches the consumer handed to the sink.
    pub batches_written: u64,
    /// Distinct continuous-full episodes observed.
    pub overflow_episodes: u64,
    /// Sink write failures (batch granularity).
    pub sink_errors: u64,
}

impl ChannelStats {
    /// Create a zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample accepted by the buffer.
    pub fn record_produced(&self) {
        self.samples_produced.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one sample rejected and discarded.
    pub fn record_dropped(&self) {
        self.samples_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record `count` samples delivered to the sink.
    pub fn record_persisted(&self, count: u64) {
        self.samples_persisted.fetch_add(count, Ordering::Relaxed);
    }

    /// Record one batch handed to the sink.
    pub fn record_batch(&self) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the start of a continuous-full episode.
    pub fn record_overflow_episode(&self) {
        self.overflow_episodes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed sink write.
    pub fn record_sink_error(&self) {
        self.sink_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            samples_produced: self.samples_produced.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            samples_persisted: self.samples_persisted.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            overflow_episodes: self.overflow_episodes.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
        }
    }
}
