//! # daq-spool
//!
//! Core library for decoupling real-time data acquisition from persistence.
//! Producers sample hardware channels at kilohertz rates and must never
//! block; storage backends flush to disk at whatever pace the filesystem
//! allows. This crate joins the two sides with a bounded in-memory buffer
//! per channel: the producer pushes without waiting and drops samples when
//! the buffer is full, the consumer drains batches and writes them out.
//!
//! ## Crate Structure
//!
//! The library is organized into several modules, each with a distinct
//! responsibility:
//!
//! - **`buffer`**: The bounded FIFO sample buffer and its edge-triggered
//!   overflow monitor. All cross-task coupling happens here.
//! - **`config`**: TOML plus environment configuration with validation.
//!   See `config::SpoolConfig`.
//! - **`consumer`**: The per-channel drain loop, the only place sink I/O
//!   happens.
//! - **`error`**: The `SpoolError` enum for centralized error handling.
//! - **`logging`**: Structured logging setup built on `tracing`.
//! - **`priority`**: Best-effort scheduling elevation for producer tasks.
//! - **`producer`**: The per-channel sampling loop running at the
//!   acquisition rate.
//! - **`registry`**: Channel lifecycle owner; builds buffers, starts tasks,
//!   and runs the ordered shutdown sequence.
//! - **`sample`**: The timestamped measurement record moving through the
//!   system.
//! - **`sink`**: The session-bracketed persistence trait and its CSV,
//!   binary, and in-memory implementations.
//! - **`source`**: The sample generation trait and a sine test source.
//! - **`stats`**: Lock-free per-channel counters and their snapshot form.

pub mod buffer;
pub mod config;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod priority;
pub mod producer;
pub mod registry;
pub mod sample;
pub mod sink;
pub mod source;
pub mod stats;
