//! Persistence consumer loop: one task per channel draining batches to a
//! sink.
//!
//! The consumer runs at a lower cadence than the producer and is the only
//! place I/O happens. Each cycle drains up to `batch_size` samples (the
//! buffer lock is released before the drain call returns) and hands the
//! batch to the [`SampleSink`] in order. Sink failures are logged and
//! counted, never fatal: a broken persistence path must not stop draining,
//! or the buffer would saturate and compound the loss.
//!
//! On `stop`, the loop switches to drain-until-empty at the same batch size,
//! closes the sink session and reports final statistics. Callers stop the
//! channel's producer first, so the final drain runs against a quiescent
//! buffer and terminates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::buffer::{BoundedSampleBuffer, OverflowMonitor};
use crate::config::ConsumerConfig;
use crate::sink::SampleSink;
use crate::stats::ChannelStats;

/// Per-channel consumer task handle.
pub struct SampleConsumer {
    channel_id: u32,
    cfg: ConsumerConfig,
    buffer: Arc<BoundedSampleBuffer>,
    monitor: Arc<OverflowMonitor>,
    stats: Arc<ChannelStats>,
    running: Arc<AtomicBool>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl SampleConsumer {
    /// Create a consumer for one channel. No task runs until `start`.
    #[must_use]
    pub fn new(
        channel_id: u32,
        cfg: ConsumerConfig,
        buffer: Arc<BoundedSampleBuffer>,
        monitor: Arc<OverflowMonitor>,
        stats: Arc<ChannelStats>,
    ) -> Self {
        Self {
            channel_id,
            cfg,
            buffer,
            monitor,
            stats,
            running: Arc::new(AtomicBool::new(false)),
            task_handle: None,
        }
    }

    /// Spawn the consumer task. The sink is moved into the task and opened
    /// with `begin` before the first drain.
    pub fn start(&mut self, sink: Box<dyn SampleSink>) {
        if self.task_handle.is_some() {
            warn!(channel = self.channel_id, "consumer already running");
            return;
        }
        self.running.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(consumer_task(
            self.channel_id,
            self.cfg.clone(),
            sink,
            Arc::clone(&self.buffer),
            Arc::clone(&self.monitor),
            Arc::clone(&self.stats),
            Arc::clone(&self.running),
        ));
        self.task_handle = Some(handle);
        debug!(
            channel = self.channel_id,
            rate_hz = self.cfg.rate_hz,
            batch_size = self.cfg.batch_size,
            "consumer started"
        );
    }

    /// Request shutdown and wait for the drain-until-empty phase to finish.
    ///
    /// Every sample the buffer accepted before this call is delivered to the
    /// sink (or logged as a sink failure) before the task exits.
    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task_handle.take() {
            if tokio::time::timeout(self.cfg.drain_timeout, handle)
                .await
                .is_err()
            {
                warn!(
                    channel = self.channel_id,
                    "consumer task did not finish draining within timeout"
                );
            }
        }
    }

    /// Whether the consumer task is currently flagged as running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

async fn consumer_task(
    channel_id: u32,
    cfg: ConsumerConfig,
    mut sink: Box<dyn SampleSink>,
    buffer: Arc<BoundedSampleBuffer>,
    monitor: Arc<OverflowMonitor>,
    stats: Arc<ChannelStats>,
    running: Arc<AtomicBool>,
) {
    if let Err(e) = sink.begin().await {
        // Keep draining anyway: wedging the buffer would also stall the
        // producer side of every future recovery.
        error!(channel = channel_id, error = %e, "failed to open sink session");
    }

    let period = Duration::from_secs_f64(1.0 / cfg.rate_hz);
    let mut ticker = tokio::time::interval(period);

    while running.load(Ordering::SeqCst) {
        ticker.tick().await;
        drain_cycle(
            channel_id,
            cfg.batch_size,
            sink.as_mut(),
            &buffer,
            &monitor,
            &stats,
        )
        .await;
    }

    // Shutdown: the producer is already stopped, so this terminates.
    while !buffer.is_empty() {
        drain_cycle(
            channel_id,
            cfg.batch_size,
            sink.as_mut(),
            &buffer,
            &monitor,
            &stats,
        )
        .await;
    }

    if let Err(e) = sink.finish().await {
        warn!(channel = channel_id, error = %e, "failed to close sink session");
    }

    let snap = stats.snapshot();
    info!(
        channel = channel_id,
        samples_persisted = snap.samples_persisted,
        batches_written = snap.batches_written,
        samples_dropped = snap.samples_dropped,
        overflow_episodes = snap.overflow_episodes,
        sink_errors = snap.sink_errors,
        "consumer finished"
    );
}

/// One drain step: pull a batch, clear the overflow flag if anything was
/// freed, write the batch outside the buffer lock.
async fn drain_cycle(
    channel_id: u32,
    batch_size: usize,
    sink: &mut dyn SampleSink,
    buffer: &BoundedSampleBuffer,
    monitor: &OverflowMonitor,
    stats: &ChannelStats,
) {
    let batch = buffer.drain(batch_size);
    if batch.is_empty() {
        return;
    }
    if monitor.clear() {
        debug!(channel = channel_id, "buffer overflow cleared by drain");
    }

    match sink.write_batch(&batch).await {
        Ok(()) => {
            stats.record_batch();
            stats.record_persisted(batch.len() as u64);
        }
        Err(e) => {
            stats.record_sink_error();
            warn!(
                channel = channel_id,
                error = %e,
                batch_len = batch.len(),
                "sink write failed, continuing"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SpoolError};
    use crate::sample::Sample;
    use crate::sink::MemorySink;
    use async_trait::async_trait;

    fn filled_buffer(capacity: usize, count: u64) -> Arc<BoundedSampleBuffer> {
        let buffer = BoundedSampleBuffer::new(capacity).unwrap();
        for n in 0..count {
            buffer.push(Sample::scalar(n, n as f64)).unwrap();
        }
        Arc::new(buffer)
    }

    fn cfg(rate_hz: f64, batch_size: usize) -> ConsumerConfig {
        ConsumerConfig {
            rate_hz,
            batch_size,
            ..ConsumerConfig::default()
        }
    }

    struct FailingSink;

    #[async_trait]
    impl SampleSink for FailingSink {
        async fn begin(&mut self) -> Result<()> {
            Ok(())
        }

        async fn append(&mut self, _sample: &Sample) -> Result<()> {
            Err(SpoolError::SinkClosed)
        }

        async fn finish(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_consumer_drains_batches_in_order() {
        let buffer = filled_buffer(64, 10);
        let monitor = Arc::new(OverflowMonitor::new());
        let stats = Arc::new(ChannelStats::new());
        let capture = MemorySink::new();
        let mut consumer = SampleConsumer::new(
            0,
            cfg(200.0, 4),
            Arc::clone(&buffer),
            monitor,
            Arc::clone(&stats),
        );

        consumer.start(Box::new(capture.clone()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        consumer.stop().await;

        assert!(capture.begun());
        assert!(capture.finished());
        assert_eq!(capture.batch_sizes(), vec![4, 4, 2]);

        let stamps: Vec<u64> = capture.samples().iter().map(Sample::timestamp_ms).collect();
        assert_eq!(stamps, (0..10).collect::<Vec<_>>());

        let snap = stats.snapshot();
        assert_eq!(snap.samples_persisted, 10);
        assert_eq!(snap.batches_written, 3);
    }

    #[tokio::test]
    async fn test_shutdown_drain_splits_into_full_batches() {
        // 250 buffered samples with batch size 100 leave the consumer
        // exactly three drains: 100, 100, 50.
        let buffer = filled_buffer(512, 250);
        let monitor = Arc::new(OverflowMonitor::new());
        let stats = Arc::new(ChannelStats::new());
        let capture = MemorySink::new();
        let mut consumer = SampleConsumer::new(
            1,
            cfg(200.0, 100),
            Arc::clone(&buffer),
            monitor,
            Arc::clone(&stats),
        );

        consumer.start(Box::new(capture.clone()));
        consumer.stop().await;

        assert_eq!(capture.batch_sizes(), vec![100, 100, 50]);
        let stamps: Vec<u64> = capture.samples().iter().map(Sample::timestamp_ms).collect();
        assert_eq!(stamps, (0..250).collect::<Vec<_>>());
        assert!(buffer.is_empty());
        assert!(capture.finished());
    }

    #[tokio::test]
    async fn test_sink_failure_never_stops_draining() {
        let buffer = filled_buffer(64, 30);
        let monitor = Arc::new(OverflowMonitor::new());
        let stats = Arc::new(ChannelStats::new());
        let mut consumer = SampleConsumer::new(
            2,
            cfg(500.0, 10),
            Arc::clone(&buffer),
            monitor,
            Arc::clone(&stats),
        );

        consumer.start(Box::new(FailingSink));
        consumer.stop().await;

        assert!(buffer.is_empty(), "failed sink must not wedge the drain");
        let snap = stats.snapshot();
        assert_eq!(snap.samples_persisted, 0);
        assert_eq!(snap.sink_errors, 3);
    }

    #[tokio::test]
    async fn test_freeing_drain_clears_overflow_flag() {
        let buffer = filled_buffer(8, 5);
        let monitor = Arc::new(OverflowMonitor::new());
        monitor.raise();
        let stats = Arc::new(ChannelStats::new());
        let mut consumer = SampleConsumer::new(
            3,
            cfg(200.0, 10),
            Arc::clone(&buffer),
            Arc::clone(&monitor),
            stats,
        );

        consumer.start(Box::new(MemorySink::new()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        consumer.stop().await;

        assert!(!monitor.is_raised());
    }
}
