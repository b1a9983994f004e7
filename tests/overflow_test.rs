//! Integration tests for bounded buffer overflow behavior.
//!
//! Validates that a full buffer rejects the newest push while leaving the
//! stored samples untouched, and that the overflow monitor reports one
//! episode per continuous full condition rather than one per rejected
//! sample.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use daq_spool::buffer::{BoundedSampleBuffer, OverflowMonitor};
use daq_spool::priority::NoElevation;
use daq_spool::producer::SampleProducer;
use daq_spool::sample::Sample;
use daq_spool::source::SineSource;
use daq_spool::stats::ChannelStats;

#[test]
fn test_full_buffer_keeps_earliest_samples() {
    let buffer = BoundedSampleBuffer::new(5).unwrap();
    let monitor = OverflowMonitor::new();

    // Six pushes into five slots: the sixth comes back whole.
    for n in 1..=6u64 {
        match buffer.push(Sample::scalar(n, n as f64)) {
            Ok(()) => assert!(n <= 5, "push {} should have been rejected", n),
            Err(overflow) => {
                assert_eq!(n, 6, "push {} rejected too early", n);
                assert_eq!(overflow.0.timestamp_ms(), 6);
                assert!(monitor.raise(), "first rejection must raise the flag");
            }
        }
    }
    assert!(buffer.is_full());
    assert!(monitor.is_raised());

    // An oversized drain returns exactly the five oldest, in order.
    let drained = buffer.drain(10);
    let stamps: Vec<u64> = drained.iter().map(Sample::timestamp_ms).collect();
    assert_eq!(stamps, vec![1, 2, 3, 4, 5]);
    assert!(buffer.is_empty());
    assert!(monitor.clear(), "freeing drain must clear the flag");
    assert!(!monitor.is_raised());

    let metrics = buffer.metrics();
    assert_eq!(metrics.accepted, 5);
    assert_eq!(metrics.rejected, 1);
}

#[test]
fn test_rejected_push_leaves_buffer_intact() {
    let buffer = BoundedSampleBuffer::new(3).unwrap();
    for n in 0..3u64 {
        buffer.push(Sample::scalar(n, 0.0)).unwrap();
    }

    // Sustained rejection: occupancy and contents never change.
    for n in 3..20u64 {
        assert!(buffer.push(Sample::scalar(n, 0.0)).is_err());
        assert_eq!(buffer.len(), 3, "rejected push changed occupancy");
    }

    let stamps: Vec<u64> = buffer
        .drain(usize::MAX)
        .iter()
        .map(Sample::timestamp_ms)
        .collect();
    assert_eq!(stamps, vec![0, 1, 2]);
    assert_eq!(buffer.metrics().rejected, 17);
}

#[tokio::test]
async fn test_draining_a_full_buffer_starts_a_new_episode() {
    let buffer = Arc::new(BoundedSampleBuffer::new(8).unwrap());
    let monitor = Arc::new(OverflowMonitor::new());
    let stats = Arc::new(ChannelStats::new());
    let enabled = Arc::new(AtomicBool::new(true));
    let mut producer = SampleProducer::new(
        0,
        1000.0,
        Arc::clone(&buffer),
        Arc::clone(&monitor),
        Arc::clone(&stats),
        enabled,
    );

    producer.start(Box::new(SineSource::new(1, 10.0)), Arc::new(NoElevation));

    // Fill to capacity: the first saturation is one episode, however many
    // pushes it rejects.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(buffer.is_full());
    assert_eq!(stats.snapshot().overflow_episodes, 1);

    // Free space. The next successful push clears the flag, so the
    // following saturation counts as a second episode.
    let freed = buffer.drain(8);
    assert_eq!(freed.len(), 8);
    tokio::time::sleep(Duration::from_millis(60)).await;
    producer.stop().await;

    let snap = stats.snapshot();
    assert_eq!(
        snap.overflow_episodes, 2,
        "recovery then saturation must count as a new episode"
    );
    assert!(monitor.is_raised());
    assert!(buffer.is_full());
    assert!(snap.samples_dropped > 0);
}
