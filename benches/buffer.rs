//! Criterion benchmarks for the bounded sample buffer hot paths.
//!
//! The push path sits inside every producer cycle and has to stay O(1) at
//! kilohertz rates; drain sits inside every consumer cycle. These baselines
//! track both, plus the rejected-push path and lock contention between the
//! two sides.
//!
//! Run with: cargo bench --bench buffer

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use daq_spool::buffer::BoundedSampleBuffer;
use daq_spool::sample::Sample;
use std::sync::Arc;
use std::thread;

/// Benchmark the accepting push path across sample dimensions.
///
/// Dimension drives the per-sample allocation size; the lock hold itself
/// should be flat.
fn push_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_push");

    for dimension in [1usize, 4, 16] {
        let buffer = BoundedSampleBuffer::new(1_000_000).unwrap();
        let values: Vec<f64> = (0..dimension).map(|i| i as f64).collect();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("accept", dimension), &dimension, |b, _| {
            b.iter(|| {
                let sample = Sample::new(black_box(1), values.clone());
                if buffer.push(sample).is_err() {
                    let _ = buffer.drain(usize::MAX);
                }
            });
        });
    }

    group.finish();
}

/// Benchmark the rejecting push path.
///
/// This is what every producer cycle pays during an overflow episode, so it
/// must cost no more than the accepting path.
fn push_when_full(c: &mut Criterion) {
    let buffer = BoundedSampleBuffer::new(64).unwrap();
    for n in 0..64u64 {
        buffer.push(Sample::scalar(n, 0.0)).unwrap();
    }

    c.bench_function("buffer_push_rejected", |b| {
        b.iter(|| {
            let result = buffer.push(black_box(Sample::scalar(99, 0.0)));
            black_box(result.is_err());
        });
    });
}

/// Benchmark one producer/consumer round: a batch of pushes followed by a
/// matching drain, across consumer batch sizes.
fn drain_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_drain");

    for batch in [10usize, 100, 1000] {
        let buffer = BoundedSampleBuffer::new(4096).unwrap();

        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("cycle", batch), &batch, |b, &batch| {
            b.iter(|| {
                for n in 0..batch as u64 {
                    let _ = buffer.push(Sample::scalar(n, 0.0));
                }
                let drained = buffer.drain(batch);
                black_box(drained.len());
            });
        });
    }

    group.finish();
}

/// Benchmark pushes racing a draining thread on the same buffer.
///
/// Approximates a producer task sharing the mutex with its consumer.
fn contended_push_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_contended");

    group.bench_function("push_under_drain_load", |b| {
        let buffer = Arc::new(BoundedSampleBuffer::new(4096).unwrap());
        b.iter(|| {
            let mut handles = vec![];

            for _ in 0..2 {
                let buf = Arc::clone(&buffer);
                handles.push(thread::spawn(move || {
                    for n in 0..100u64 {
                        let _ = buf.push(Sample::scalar(n, 0.0));
                    }
                }));
            }

            let buf = Arc::clone(&buffer);
            handles.push(thread::spawn(move || {
                for _ in 0..4 {
                    let _ = buf.drain(100);
                }
            }));

            for handle in handles {
                handle.join().unwrap();
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    push_throughput,
    push_when_full,
    drain_batches,
    contended_push_drain
);
criterion_main!(benches);
