//! Bounded per-channel sample buffer and overflow monitoring.
//!
//! [`BoundedSampleBuffer`] is the decoupling point between a channel's
//! real-time producer and its persistence consumer: a fixed-capacity FIFO
//! that rejects pushes when full instead of blocking or overwriting. The
//! critical section is a single short mutex hold with no I/O and no
//! allocation beyond the drained batch, so producer latency stays bounded
//! regardless of what the consumer is doing.
//!
//! [`OverflowMonitor`] turns the buffer's per-push rejections into an
//! edge-triggered condition: one warning per continuous full episode rather
//! than one per rejected sample.
//!
//! Each channel owns its own buffer. There is no shared state between
//! buffers, so channels never contend with one another.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use thiserror::Error;

use crate::error::SpoolError;
use crate::sample::Sample;

/// A push was rejected because the buffer was full.
///
/// Carries the rejected sample back to the caller; the caller decides the
/// drop policy (the producer loop drops it and moves on). This is an expected
/// per-sample outcome under sustained overload, not a pipeline failure, which
/// is why it is a standalone type rather than a [`SpoolError`] variant.
#[derive(Debug, Error)]
#[error("buffer full, sample rejected")]
pub struct Overflow(pub Sample);

/// Counter snapshot for one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferMetrics {
    /// Samples accepted by `push` since construction.
    pub accepted: u64,
    /// Samples rejected by `push` since construction.
    pub rejected: u64,
}

/// Fixed-capacity FIFO buffer for one channel's samples.
///
/// # Contract
///
/// - Capacity is fixed at construction and must be at least 1.
/// - [`push`](Self::push) is O(1), never blocks on I/O, and either appends
///   the sample or rejects it whole; a rejected push does not mutate the
///   buffer.
/// - [`drain`](Self::drain) removes up to `max` samples from the head in
///   insertion order.
/// - All mutating operations on one buffer share a single per-buffer mutex;
///   the lock is never held across I/O or `.await` by any caller in this
///   crate.
#[derive(Debug)]
pub struct BoundedSampleBuffer {
    capacity: usize,
    queue: Mutex<VecDeque<Sample>>,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl BoundedSampleBuffer {
    /// Create a buffer holding at most `capacity` samples.
    ///
    /// # Errors
    ///
    /// Returns [`SpoolError::InvalidCapacity`] when `capacity` is zero. This
    /// is a startup precondition; the registry refuses to build the channel.
    pub fn new(capacity: usize) -> Result<Self, SpoolError> {
        if capacity == 0 {
            return Err(SpoolError::InvalidCapacity { capacity });
        }
        Ok(Self {
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        })
    }

    /// Append a sample at the tail.
    ///
    /// # Errors
    ///
    /// Returns [`Overflow`] with the sample when the buffer is already at
    /// capacity. The buffer is left untouched in that case.
    pub fn push(&self, sample: Sample) -> Result<(), Overflow> {
        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity {
            drop(queue);
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(Overflow(sample));
        }
        queue.push_back(sample);
        drop(queue);
        self.accepted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Remove and return up to `max` of the oldest samples, in insertion
    /// order.
    ///
    /// Returns an empty vec when the buffer is empty. The lock is released
    /// before this call returns, so callers are free to do arbitrary I/O
    /// with the batch.
    #[must_use]
    pub fn drain(&self, max: usize) -> Vec<Sample> {
        let mut queue = self.queue.lock();
        let take = max.min(queue.len());
        queue.drain(..take).collect()
    }

    /// Whether the buffer currently holds `capacity` samples.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.queue.lock().len() >= self.capacity
    }

    /// Whether the buffer currently holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Number of samples currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Maximum number of samples this buffer can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the accept/reject counters.
    #[must_use]
    pub fn metrics(&self) -> BufferMetrics {
        BufferMetrics {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Edge-triggered overflow condition for one buffer.
///
/// The flag is raised on the first rejected push of a full episode and
/// cleared when a drain frees at least one slot or a later push succeeds.
/// [`raise`](Self::raise) reports whether the call was the raising edge, so
/// the producer loop emits exactly one warning per episode however long the
/// buffer stays saturated.
#[derive(Debug, Default)]
pub struct OverflowMonitor {
    raised: AtomicBool,
}

impl OverflowMonitor {
    /// Create a monitor with the flag lowered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the buffer as overflowing.
    ///
    /// Returns `true` only when this call transitioned the flag from lowered
    /// to raised.
    pub fn raise(&self) -> bool {
        !self.raised.swap(true, Ordering::SeqCst)
    }

    /// Mark the overflow condition as resolved.
    ///
    /// Returns `true` only when this call transitioned the flag from raised
    /// to lowered. Safe to call redundantly; callers invoke it after every
    /// successful push or freeing drain.
    pub fn clear(&self) -> bool {
        self.raised.swap(false, Ordering::SeqCst)
    }

    /// Whether the buffer has been continuously full since the last clear.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}
