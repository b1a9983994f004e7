//! Sample record produced by the acquisition path.
//!
//! A [`Sample`] is the unit of data flowing through the pipeline: one
//! timestamped, fixed-dimension vector of channel values. Samples are
//! immutable once constructed; producers create them, buffers move them,
//! sinks persist them, and nothing in between modifies them.

use serde::{Deserialize, Serialize};

/// One timestamped measurement vector.
///
/// The timestamp is monotonic milliseconds from the source's own epoch
/// (typically task start), not wall-clock time, so ordering survives clock
/// adjustments. The value vector has a fixed dimension per channel, set by
/// the channel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    timestamp_ms: u64,
    values: Vec<f64>,
}

impl Sample {
    /// Create a sample from a monotonic timestamp and a value vector.
    #[must_use]
    pub fn new(timestamp_ms: u64, values: Vec<f64>) -> Self {
        Self {
            timestamp_ms,
            values,
        }
    }

    /// Create a one-dimensional sample.
    #[must_use]
    pub fn scalar(timestamp_ms: u64, value: f64) -> Self {
        Self::new(timestamp_ms, vec![value])
    }

    /// Monotonic timestamp in milliseconds.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Channel values, in configured dimension order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of values in this sample.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_accessors() {
        let s = Sample::new(42, vec![1.0, 2.0, 3.0]);
        assert_eq!(s.timestamp_ms(), 42);
        assert_eq!(s.values(), &[1.0, 2.0, 3.0]);
        assert_eq!(s.dimension(), 3);
    }

    #[test]
    fn test_scalar_constructor() {
        let s = Sample::scalar(7, 0.5);
        assert_eq!(s.dimension(), 1);
        assert_eq!(s.values()[0], 0.5);
    }

    #[test]
    fn test_clone_preserves_contents() {
        let s = Sample::new(1, vec![9.9]);
        let c = s.clone();
        assert_eq!(s, c);
    }
}
