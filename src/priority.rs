//! Best-effort scheduling elevation for producer tasks.
//!
//! Elevated OS scheduling is a privileged, platform-specific capability, so
//! it sits behind the narrowest possible seam: one request, made once per
//! producer task at startup, whose denial is non-fatal. Correctness never
//! depends on the outcome; only worst-case producer latency does. The actual
//! OS mechanics belong to the embedding application, which supplies its own
//! [`PriorityPolicy`] implementation.

use thiserror::Error;

/// An elevation request was not honored.
#[derive(Debug, Clone, Error)]
#[error("scheduling elevation denied: {reason}")]
pub struct PriorityDenied {
    /// Platform- or policy-specific explanation.
    pub reason: String,
}

impl PriorityDenied {
    /// Create a denial with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Best-effort request for elevated scheduling.
pub trait PriorityPolicy: Send + Sync {
    /// Ask for elevated scheduling for the calling task.
    ///
    /// # Errors
    ///
    /// Returns [`PriorityDenied`] when the platform or policy refuses. The
    /// producer logs the denial once and continues unchanged.
    fn request_elevated(&self) -> Result<(), PriorityDenied>;
}

/// Policy that never requests anything from the OS.
///
/// The request is trivially satisfied; producers run at normal priority.
/// This is the default for the demo binary and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoElevation;

impl PriorityPolicy for NoElevation {
    fn request_elevated(&self) -> Result<(), PriorityDenied> {
        Ok(())
    }
}
