//! Real-time producer loop: one task per channel appending samples on a
//! fixed cadence.
//!
//! Each cycle reads one sample from the channel's [`SampleSource`] and pushes
//! it into the bounded buffer. The cycle never blocks on the consumer and
//! never performs I/O: a full buffer costs one rejected push and one dropped
//! sample, nothing more. Overflow episodes are reported through the
//! [`OverflowMonitor`] so a saturated channel logs one warning, not one per
//! sample.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::buffer::{BoundedSampleBuffer, Overflow, OverflowMonitor};
use crate::priority::PriorityPolicy;
use crate::source::SampleSource;
use crate::stats::ChannelStats;

/// Per-channel producer task handle.
///
/// Owned by the registry. `start` spawns the loop; `stop` flags it down and
/// waits for the task to exit. The producer holds no buffered state of its
/// own, so stopping it loses nothing.
pub struct SampleProducer {
    channel_id: u32,
    rate_hz: f64,
    buffer: Arc<BoundedSampleBuffer>,
    monitor: Arc<OverflowMonitor>,
    stats: Arc<ChannelStats>,
    enabled: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl SampleProducer {
    /// Create a producer for one channel. No task runs until `start`.
    #[must_use]
    pub fn new(
        channel_id: u32,
        rate_hz: f64,
        buffer: Arc<BoundedSampleBuffer>,
        monitor: Arc<OverflowMonitor>,
        stats: Arc<ChannelStats>,
        enabled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            channel_id,
            rate_hz,
            buffer,
            monitor,
            stats,
            enabled,
            running: Arc::new(AtomicBool::new(false)),
            task_handle: None,
        }
    }

    /// Spawn the producer task.
    ///
    /// The source is moved into the task; the priority policy is consulted
    /// once before the first cycle.
    pub fn start(&mut self, source: Box<dyn SampleSource>, priority: Arc<dyn PriorityPolicy>) {
        if self.task_handle.is_some() {
            warn!(channel = self.channel_id, "producer already running");
            return;
        }
        self.running.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(producer_task(
            self.channel_id,
            self.rate_hz,
            source,
            Arc::clone(&self.buffer),
            Arc::clone(&self.monitor),
            Arc::clone(&self.stats),
            Arc::clone(&self.enabled),
            Arc::clone(&self.running),
            priority,
        ));
        self.task_handle = Some(handle);
        debug!(
            channel = self.channel_id,
            rate_hz = self.rate_hz,
            "producer started"
        );
    }

    /// Flag the loop down and wait for the task to exit.
    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task_handle.take() {
            if tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .is_err()
            {
                warn!(
                    channel = self.channel_id,
                    "producer task did not stop within timeout"
                );
            }
        }
    }

    /// Whether the producer task is currently flagged as running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[allow(clippy::too_many_arguments)]
async fn producer_task(
    channel_id: u32,
    rate_hz: f64,
    mut source: Box<dyn SampleSource>,
    buffer: Arc<BoundedSampleBuffer>,
    monitor: Arc<OverflowMonitor>,
    stats: Arc<ChannelStats>,
    enabled: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    priority: Arc<dyn PriorityPolicy>,
) {
    match priority.request_elevated() {
        Ok(()) => debug!(channel = channel_id, "scheduling elevation satisfied"),
        Err(e) => warn!(channel = channel_id, error = %e, "running at normal priority"),
    }

    let period = Duration::from_secs_f64(1.0 / rate_hz);
    let mut ticker = tokio::time::interval(period);
    // A cycle the runtime could not schedule on time is skipped, not bursted.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while running.load(Ordering::SeqCst) {
        ticker.tick().await;
        if !enabled.load(Ordering::SeqCst) {
            continue;
        }

        let sample = source.next_sample();
        match buffer.push(sample) {
            Ok(()) => {
                stats.record_produced();
                if monitor.clear() {
                    debug!(channel = channel_id, "buffer overflow cleared");
                }
            }
            Err(Overflow(_)) => {
                stats.record_dropped();
                if monitor.raise() {
                    stats.record_overflow_episode();
                    warn!(
                        channel = channel_id,
                        capacity = buffer.capacity(),
                        "buffer full, dropping samples"
                    );
                }
            }
        }
    }

    debug!(channel = channel_id, "producer loop exited");
}
