//! Sample sources feeding the producer loops.
//!
//! A [`SampleSource`] stands in for the external control path: once per
//! producer cycle it hands back the current device state as a [`Sample`].
//! The call is synchronous and must be fast; anything slow or blocking
//! belongs on the consumer side of the buffer.
//!
//! [`SineSource`] is the bundled simulated source, generating a noisy
//! multi-phase sine so the demo binary and tests run without hardware.

use std::f64::consts::TAU;
use std::time::Instant;

use rand::Rng;

use crate::sample::Sample;

/// Supplies one sample per producer cycle.
///
/// Implementations are moved into the producer task, so they may keep
/// whatever internal state they need (phase accumulators, device handles,
/// RNGs) without synchronization.
pub trait SampleSource: Send + 'static {
    /// Current device state as a timestamped sample.
    ///
    /// Must not block and must not perform I/O; the producer calls this on
    /// its real-time cadence.
    fn next_sample(&mut self) -> Sample;

    /// Vector dimension of the samples this source produces.
    fn dimension(&self) -> usize;
}

/// Simulated source: per-dimension phase-shifted sine with multiplicative
/// noise.
///
/// Timestamps are monotonic milliseconds from source construction.
#[derive(Debug)]
pub struct SineSource {
    dimension: usize,
    frequency_hz: f64,
    amplitude: f64,
    noise: f64,
    epoch: Instant,
}

impl SineSource {
    /// Create a source producing `dimension`-element samples oscillating at
    /// `frequency_hz`, with 5% noise and unit amplitude.
    #[must_use]
    pub fn new(dimension: usize, frequency_hz: f64) -> Self {
        Self {
            dimension,
            frequency_hz,
            amplitude: 1.0,
            noise: 0.05,
            epoch: Instant::now(),
        }
    }

    /// Set the peak amplitude.
    #[must_use]
    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Set the multiplicative noise fraction (0 disables noise).
    #[must_use]
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }
}

impl SampleSource for SineSource {
    fn next_sample(&mut self) -> Sample {
        let elapsed = self.epoch.elapsed();
        let t = elapsed.as_secs_f64();
        let timestamp_ms = elapsed.as_millis() as u64;

        let mut rng = rand::thread_rng();
        let values = (0..self.dimension)
            .map(|i| {
                // Quarter-turn phase offset per dimension keeps the columns
                // visually distinct in the output files.
                let phase = i as f64 * TAU / 4.0;
                let clean = self.amplitude * (TAU * self.frequency_hz * t + phase).sin();
                let jitter = if self.noise > 0.0 {
                    rng.gen_range(-self.noise..self.noise)
                } else {
                    0.0
                };
                clean * (1.0 + jitter)
            })
            .collect();

        Sample::new(timestamp_ms, values)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
