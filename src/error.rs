//! Error types for the sample spooling core.
//!
//! This module defines the primary error type, `SpoolError`, for the crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to
//! handle the different failure modes of the spooling pipeline, from
//! configuration problems to channel lifecycle violations and sink I/O.
//!
//! The one condition that is deliberately *not* represented here is buffer
//! overflow: a rejected push is an expected, per-sample outcome on the hot
//! path and is modeled by [`crate::buffer::Overflow`] instead, so that call
//! sites handle it locally rather than propagating it as a pipeline failure.

use thiserror::Error;

use crate::registry::ChannelState;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, SpoolError>;

/// Primary error type for the spooling pipeline.
///
/// # Error Categories
///
/// 1. **Configuration errors** - `ConfigLoad`, `Config`, `InvalidCapacity`
///    - Occur during startup; permanent until the configuration is fixed.
///    - Recovery: abort startup and report to the operator.
///
/// 2. **Lifecycle errors** - `InvalidTransition`, `ChannelExists`,
///    `UnknownChannel`
///    - Indicate a programming error or misuse of the registry, such as
///      draining a channel that was never started.
///    - Recovery: none at runtime; fix the calling code.
///
/// 3. **Sink errors** - `Io`, `Csv`, `SinkClosed`
///    - Occur on the persistence path. The consumer loop logs these and keeps
///      draining; they only surface as `SpoolError` from direct sink calls.
#[derive(Error, Debug)]
pub enum SpoolError {
    /// A buffer was requested with zero capacity.
    ///
    /// Capacity is fixed for the lifetime of a channel and must be able to
    /// hold at least one sample; a zero-capacity buffer would reject every
    /// push and the channel could never deliver data.
    ///
    /// **Error Type**: Permanent - requires fixing the channel configuration.
    ///
    /// **Recovery Strategy**: Refuse to start the channel; the registry
    /// aborts startup before any task is launched.
    #[error("invalid buffer capacity {capacity}: must be at least 1 sample")]
    InvalidCapacity {
        /// The rejected capacity value.
        capacity: usize,
    },

    /// A channel was asked to move backwards or skip through its lifecycle.
    ///
    /// Channel states advance strictly `Uninitialized -> Active -> Draining
    /// -> Closed`. Anything else (restarting a closed channel, draining one
    /// that never started) is a precondition violation, not a recoverable
    /// runtime condition.
    ///
    /// **Error Type**: Permanent - indicates a bug in the calling code.
    #[error("invalid channel state transition: {from} -> {to}")]
    InvalidTransition {
        /// State the channel was in.
        from: ChannelState,
        /// State the caller requested.
        to: ChannelState,
    },

    /// Two channels were configured with the same identity.
    #[error("duplicate channel id {id}")]
    ChannelExists {
        /// The colliding channel id.
        id: u32,
    },

    /// An operation referenced a channel id the registry does not own.
    #[error("unknown channel id {id}")]
    UnknownChannel {
        /// The unrecognized channel id.
        id: u32,
    },

    /// Configuration file loading or parsing failed.
    ///
    /// **Error Type**: Permanent - requires fixing the configuration file.
    ///
    /// **Recovery Strategy**: Abort startup, display the error to the user.
    #[error("configuration error: {0}")]
    ConfigLoad(#[from] figment::Error),

    /// Configuration values parsed but failed semantic validation.
    ///
    /// Examples: a non-positive sampling rate, an unknown storage format, or
    /// a zero batch size.
    ///
    /// **Error Type**: Permanent - requires fixing the configuration values.
    #[error("configuration validation error: {0}")]
    Config(String),

    /// Standard I/O operation failed.
    ///
    /// Raised by file sinks when creating, writing or flushing output files.
    ///
    /// **Error Type**: Can be transient (disk pressure) or permanent
    /// (permission denied).
    ///
    /// **Recovery Strategy**: The consumer loop logs the failure and
    /// continues draining; persistence failures never stop the pipeline.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A sample's vector dimension does not match the sink's.
    ///
    /// File sinks fix their record layout at construction from the channel
    /// dimension; a mismatched sample indicates the channel was wired to the
    /// wrong sink.
    ///
    /// **Error Type**: Permanent - indicates a configuration or wiring bug.
    #[error("sample dimension {actual} does not match sink dimension {expected}")]
    DimensionMismatch {
        /// Dimension the sink was built for.
        expected: usize,
        /// Dimension of the offending sample.
        actual: usize,
    },

    /// A sink was used outside its begin/finish session window.
    ///
    /// Sinks bracket a channel's lifetime with a begin/finish pair; appending
    /// before `begin` or after `finish` indicates a lifecycle bug in the
    /// caller.
    ///
    /// **Error Type**: Permanent - indicates a programming error.
    #[error("sink session not open")]
    SinkClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_capacity_display() {
        let err = SpoolError::InvalidCapacity { capacity: 0 };
        assert_eq!(
            err.to_string(),
            "invalid buffer capacity 0: must be at least 1 sample"
        );
    }

    #[test]
    fn test_transition_display() {
        let err = SpoolError::InvalidTransition {
            from: ChannelState::Closed,
            to: ChannelState::Active,
        };
        assert!(err.to_string().contains("closed -> active"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SpoolError = io.into();
        assert!(matches!(err, SpoolError::Io(_)));
    }
}
