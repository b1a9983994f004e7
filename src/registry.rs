//! Channel registry and lifecycle orchestration.
//!
//! The registry owns one channel per configured identity: a bounded buffer,
//! a producer task and a consumer task. Buffers are constructed when the
//! channel is added, before any task exists, so a producer can never observe
//! a missing buffer. Startup launches the consumer before the producer of
//! each channel; shutdown stops every producer first, then waits for every
//! consumer to finish its drain-until-empty phase.
//!
//! Channel lifecycle is an explicit one-directional state machine rather
//! than a set of booleans, so shutdown ordering stays auditable:
//! `Uninitialized -> Active -> Draining -> Closed`, with `Closed` terminal.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::buffer::{BoundedSampleBuffer, OverflowMonitor};
use crate::config::{ChannelConfig, ConsumerConfig};
use crate::consumer::SampleConsumer;
use crate::error::{Result, SpoolError};
use crate::priority::PriorityPolicy;
use crate::producer::SampleProducer;
use crate::sink::SampleSink;
use crate::source::SampleSource;
use crate::stats::{ChannelStats, StatsSnapshot};

/// Lifecycle state of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Buffer exists; no task has been launched.
    Uninitialized,
    /// Producer and consumer tasks are running.
    Active,
    /// Producer stopped; consumer is flushing the buffer.
    Draining,
    /// Terminal: tasks exited, buffer drained.
    Closed,
}

impl ChannelState {
    /// Whether `next` is the legal successor of this state.
    ///
    /// The lifecycle is a strict chain; skipping or reversing is never
    /// allowed.
    #[must_use]
    pub fn can_advance_to(self, next: ChannelState) -> bool {
        matches!(
            (self, next),
            (ChannelState::Uninitialized, ChannelState::Active)
                | (ChannelState::Active, ChannelState::Draining)
                | (ChannelState::Draining, ChannelState::Closed)
        )
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChannelState::Uninitialized => "uninitialized",
            ChannelState::Active => "active",
            ChannelState::Draining => "draining",
            ChannelState::Closed => "closed",
        };
        write!(f, "{label}")
    }
}

fn advance(state: &mut ChannelState, to: ChannelState) -> Result<()> {
    if !state.can_advance_to(to) {
        return Err(SpoolError::InvalidTransition { from: *state, to });
    }
    *state = to;
    Ok(())
}

/// Final accounting for one channel, produced at shutdown.
#[derive(Debug, Clone)]
pub struct ChannelReport {
    /// Channel identity.
    pub id: u32,
    /// Configured channel name.
    pub name: String,
    /// Counter values at close.
    pub stats: StatsSnapshot,
}

struct Channel {
    id: u32,
    name: String,
    state: ChannelState,
    buffer: Arc<BoundedSampleBuffer>,
    stats: Arc<ChannelStats>,
    enabled: Arc<AtomicBool>,
    producer: SampleProducer,
    consumer: SampleConsumer,
    source: Option<Box<dyn SampleSource>>,
    sink: Option<Box<dyn SampleSink>>,
}

/// Owner of every channel triple (buffer, producer, consumer).
pub struct ChannelRegistry {
    channels: Vec<Channel>,
    consumer_cfg: ConsumerConfig,
    priority: Arc<dyn PriorityPolicy>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    ///
    /// `consumer_cfg` applies to every channel's consumer; the priority
    /// policy is consulted once per producer task at start.
    #[must_use]
    pub fn new(consumer_cfg: ConsumerConfig, priority: Arc<dyn PriorityPolicy>) -> Self {
        Self {
            channels: Vec::new(),
            consumer_cfg,
            priority,
        }
    }

    /// Add a channel: builds its buffer now, launches nothing.
    ///
    /// # Errors
    ///
    /// - [`SpoolError::ChannelExists`] when the id is already registered.
    /// - [`SpoolError::InvalidCapacity`] when the configured capacity is 0.
    /// - [`SpoolError::DimensionMismatch`] when the source's dimension does
    ///   not match the channel configuration.
    /// - [`SpoolError::Config`] when the producer or consumer rate is not a
    ///   positive, finite frequency. Both rates become tick periods inside
    ///   the spawned tasks, so they are checked here, before any task exists.
    pub fn add_channel(
        &mut self,
        cfg: &ChannelConfig,
        source: Box<dyn SampleSource>,
        sink: Box<dyn SampleSink>,
    ) -> Result<()> {
        if self.channels.iter().any(|ch| ch.id == cfg.id) {
            return Err(SpoolError::ChannelExists { id: cfg.id });
        }
        if source.dimension() != cfg.dimension {
            return Err(SpoolError::DimensionMismatch {
                expected: cfg.dimension,
                actual: source.dimension(),
            });
        }
        if !cfg.producer_rate_hz.is_finite() || cfg.producer_rate_hz <= 0.0 {
            return Err(SpoolError::Config(format!(
                "channel {} producer_rate_hz must be positive, got {}",
                cfg.id, cfg.producer_rate_hz
            )));
        }
        if !self.consumer_cfg.rate_hz.is_finite() || self.consumer_cfg.rate_hz <= 0.0 {
            return Err(SpoolError::Config(format!(
                "consumer rate_hz must be positive, got {}",
                self.consumer_cfg.rate_hz
            )));
        }

        let buffer = Arc::new(BoundedSampleBuffer::new(cfg.capacity)?);
        let monitor = Arc::new(OverflowMonitor::new());
        let stats = Arc::new(ChannelStats::new());
        let enabled = Arc::new(AtomicBool::new(cfg.enabled));

        let producer = SampleProducer::new(
            cfg.id,
            cfg.producer_rate_hz,
            Arc::clone(&buffer),
            Arc::clone(&monitor),
            Arc::clone(&stats),
            Arc::clone(&enabled),
        );
        let consumer = SampleConsumer::new(
            cfg.id,
            self.consumer_cfg.clone(),
            Arc::clone(&buffer),
            Arc::clone(&monitor),
            Arc::clone(&stats),
        );

        debug!(
            channel = cfg.id,
            name = %cfg.name,
            capacity = cfg.capacity,
            dimension = cfg.dimension,
            "channel registered"
        );
        self.channels.push(Channel {
            id: cfg.id,
            name: cfg.name.clone(),
            state: ChannelState::Uninitialized,
            buffer,
            stats,
            enabled,
            producer,
            consumer,
            source: Some(source),
            sink: Some(sink),
        });
        Ok(())
    }

    /// Launch every channel's tasks.
    ///
    /// All buffers already exist at this point. Within each channel the
    /// consumer starts before the producer, so a drain cycle is pending by
    /// the time pushes begin. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`SpoolError::InvalidTransition`] when the registry was already
    /// started or shut down.
    pub fn start(&mut self) -> Result<()> {
        for ch in &mut self.channels {
            advance(&mut ch.state, ChannelState::Active)?;
            if let Some(sink) = ch.sink.take() {
                ch.consumer.start(sink);
            }
            if let Some(source) = ch.source.take() {
                ch.producer.start(source, Arc::clone(&self.priority));
            }
        }
        info!(channels = self.channels.len(), "registry started");
        Ok(())
    }

    /// Stop all producers, wait for every consumer to drain to empty, and
    /// close the channels.
    ///
    /// Returns a report per channel closed by this call. Channels that were
    /// never started are skipped; calling this again after a completed
    /// shutdown is a no-op with an empty report list.
    ///
    /// # Errors
    ///
    /// [`SpoolError::InvalidTransition`] only on internal state corruption;
    /// a normally used registry shuts down cleanly.
    pub async fn shutdown(&mut self) -> Result<Vec<ChannelReport>> {
        let closing: Vec<u32> = self
            .channels
            .iter()
            .filter(|ch| ch.state == ChannelState::Active)
            .map(|ch| ch.id)
            .collect();
        if closing.is_empty() {
            debug!("shutdown: no active channels");
            return Ok(Vec::new());
        }
        info!(channels = closing.len(), "shutdown: stopping producers");

        // Phase 1: no new samples. Producers hold no state, so stopping them
        // loses nothing.
        futures::future::join_all(
            self.channels
                .iter_mut()
                .filter(|ch| ch.state == ChannelState::Active)
                .map(|ch| ch.producer.stop()),
        )
        .await;
        for ch in &mut self.channels {
            if ch.state == ChannelState::Active {
                advance(&mut ch.state, ChannelState::Draining)?;
            }
        }

        // Phase 2: every consumer drains its quiescent buffer to empty.
        info!("shutdown: draining consumers");
        futures::future::join_all(
            self.channels
                .iter_mut()
                .filter(|ch| ch.state == ChannelState::Draining)
                .map(|ch| ch.consumer.stop()),
        )
        .await;

        let mut reports = Vec::with_capacity(closing.len());
        for ch in &mut self.channels {
            if ch.state == ChannelState::Draining {
                advance(&mut ch.state, ChannelState::Closed)?;
                reports.push(ChannelReport {
                    id: ch.id,
                    name: ch.name.clone(),
                    stats: ch.stats.snapshot(),
                });
            }
        }
        info!(channels = reports.len(), "shutdown complete");
        Ok(reports)
    }

    /// Enable or disable a channel's producer; the flag is checked every
    /// cycle before a push is attempted.
    ///
    /// # Errors
    ///
    /// [`SpoolError::UnknownChannel`] when no channel has this id.
    pub fn set_enabled(&self, id: u32, enabled: bool) -> Result<()> {
        let ch = self.channel(id)?;
        ch.enabled.store(enabled, Ordering::SeqCst);
        debug!(channel = id, enabled, "channel enable flag updated");
        Ok(())
    }

    /// Current lifecycle state of a channel.
    ///
    /// # Errors
    ///
    /// [`SpoolError::UnknownChannel`] when no channel has this id.
    pub fn state(&self, id: u32) -> Result<ChannelState> {
        Ok(self.channel(id)?.state)
    }

    /// Snapshot of a channel's counters.
    ///
    /// # Errors
    ///
    /// [`SpoolError::UnknownChannel`] when no channel has this id.
    pub fn stats(&self, id: u32) -> Result<StatsSnapshot> {
        Ok(self.channel(id)?.stats.snapshot())
    }

    /// Number of samples currently held in a channel's buffer.
    ///
    /// # Errors
    ///
    /// [`SpoolError::UnknownChannel`] when no channel has this id.
    pub fn buffered(&self, id: u32) -> Result<usize> {
        Ok(self.channel(id)?.buffer.len())
    }

    /// Registered channel ids, in registration order.
    #[must_use]
    pub fn channel_ids(&self) -> Vec<u32> {
        self.channels.iter().map(|ch| ch.id).collect()
    }

    /// Number of registered channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the registry holds no channels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn channel(&self, id: u32) -> Result<&Channel> {
        self.channels
            .iter()
            .find(|ch| ch.id == id)
            .ok_or(SpoolError::UnknownChannel { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priority::NoElevation;
    use crate::sink::MemorySink;
    use crate::source::SineSource;

    fn channel_cfg(id: u32, capacity: usize) -> ChannelConfig {
        ChannelConfig {
            id,
            name: format!("ch{id}"),
            enabled: true,
            dimension: 1,
            capacity,
            producer_rate_hz: 1000.0,
        }
    }

    fn registry() -> ChannelRegistry {
        ChannelRegistry::new(ConsumerConfig::default(), Arc::new(NoElevation))
    }

    fn sine(dimension: usize) -> Box<SineSource> {
        Box::new(SineSource::new(dimension, 10.0))
    }

    #[test]
    fn test_state_chain_is_one_directional() {
        use ChannelState::*;
        assert!(Uninitialized.can_advance_to(Active));
        assert!(Active.can_advance_to(Draining));
        assert!(Draining.can_advance_to(Closed));

        assert!(!Uninitialized.can_advance_to(Draining));
        assert!(!Uninitialized.can_advance_to(Closed));
        assert!(!Active.can_advance_to(Uninitialized));
        assert!(!Active.can_advance_to(Closed));
        assert!(!Closed.can_advance_to(Active));
        assert!(!Closed.can_advance_to(Uninitialized));
    }

    #[test]
    fn test_duplicate_channel_id_rejected() {
        let mut reg = registry();
        reg.add_channel(&channel_cfg(1, 16), sine(1), Box::new(MemorySink::new()))
            .unwrap();
        let err = reg
            .add_channel(&channel_cfg(1, 16), sine(1), Box::new(MemorySink::new()))
            .unwrap_err();
        assert!(matches!(err, SpoolError::ChannelExists { id: 1 }));
    }

    #[test]
    fn test_zero_capacity_refuses_channel() {
        let mut reg = registry();
        let err = reg
            .add_channel(&channel_cfg(1, 0), sine(1), Box::new(MemorySink::new()))
            .unwrap_err();
        assert!(matches!(err, SpoolError::InvalidCapacity { capacity: 0 }));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_source_dimension_must_match_config() {
        let mut reg = registry();
        let err = reg
            .add_channel(&channel_cfg(1, 16), sine(3), Box::new(MemorySink::new()))
            .unwrap_err();
        assert!(matches!(
            err,
            SpoolError::DimensionMismatch {
                expected: 1,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_nonpositive_producer_rate_refused() {
        let mut reg = registry();
        for bad_rate in [0.0, -250.0, f64::NAN, f64::INFINITY] {
            let mut cfg = channel_cfg(1, 16);
            cfg.producer_rate_hz = bad_rate;
            let err = reg
                .add_channel(&cfg, sine(1), Box::new(MemorySink::new()))
                .unwrap_err();
            assert!(matches!(err, SpoolError::Config(_)), "rate {bad_rate} accepted");
        }
        assert!(reg.is_empty(), "rejected channels must not be registered");
    }

    #[test]
    fn test_nonpositive_consumer_rate_refused() {
        let consumer_cfg = ConsumerConfig {
            rate_hz: 0.0,
            ..ConsumerConfig::default()
        };
        let mut reg = ChannelRegistry::new(consumer_cfg, Arc::new(NoElevation));
        let err = reg
            .add_channel(&channel_cfg(1, 16), sine(1), Box::new(MemorySink::new()))
            .unwrap_err();
        assert!(matches!(err, SpoolError::Config(_)));
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_states() {
        let mut reg = registry();
        reg.add_channel(&channel_cfg(1, 64), sine(1), Box::new(MemorySink::new()))
            .unwrap();
        assert_eq!(reg.state(1).unwrap(), ChannelState::Uninitialized);

        reg.start().unwrap();
        assert_eq!(reg.state(1).unwrap(), ChannelState::Active);

        let reports = reg.shutdown().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reg.state(1).unwrap(), ChannelState::Closed);

        // Shutdown is idempotent once everything is closed.
        let again = reg.shutdown().await.unwrap();
        assert!(again.is_empty());

        // Closed is terminal: a restart is a precondition violation.
        let err = reg.start().unwrap_err();
        assert!(matches!(err, SpoolError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_without_start_is_noop() {
        let mut reg = registry();
        reg.add_channel(&channel_cfg(1, 64), sine(1), Box::new(MemorySink::new()))
            .unwrap();
        let reports = reg.shutdown().await.unwrap();
        assert!(reports.is_empty());
        assert_eq!(reg.state(1).unwrap(), ChannelState::Uninitialized);
    }

    #[tokio::test]
    async fn test_unknown_channel_queries_error() {
        let reg = registry();
        assert!(matches!(
            reg.state(9),
            Err(SpoolError::UnknownChannel { id: 9 })
        ));
        assert!(matches!(
            reg.set_enabled(9, false),
            Err(SpoolError::UnknownChannel { id: 9 })
        ));
    }
}
