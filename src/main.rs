//! CLI entry point for daq-spool.
//!
//! Provides a command-line interface for:
//! - Running buffered acquisition on every enabled channel
//! - Validating a configuration file without touching hardware or disk
//!
//! # Usage
//!
//! Acquire until Ctrl+C (or for a fixed duration):
//! ```bash
//! daq-spool run --config config/daq-spool.toml
//! daq-spool run --config config/daq-spool.toml --duration 10
//! ```
//!
//! Check a configuration file:
//! ```bash
//! daq-spool validate --config config/daq-spool.toml
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::signal;

use daq_spool::config::SpoolConfig;
use daq_spool::logging;
use daq_spool::priority::NoElevation;
use daq_spool::registry::ChannelRegistry;
use daq_spool::sink::{file_sink, output_path};
use daq_spool::source::SineSource;

#[derive(Parser)]
#[command(name = "daq-spool")]
#[command(about = "Buffered sample acquisition with decoupled persistence", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire from all enabled channels until stopped
    Run {
        /// Path to TOML configuration file
        #[arg(long, default_value = "config/daq-spool.toml")]
        config: PathBuf,

        /// Stop after this many seconds instead of waiting for Ctrl+C
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Check a configuration file and report what it would acquire
    Validate {
        /// Path to TOML configuration file
        #[arg(long, default_value = "config/daq-spool.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, duration } => run_acquisition(config, duration).await,
        Commands::Validate { config } => validate_config(&config),
    }
}

async fn run_acquisition(config_path: PathBuf, duration: Option<u64>) -> Result<()> {
    let config = SpoolConfig::load_from(&config_path)?;
    config.validate()?;
    logging::init_from_config(&config)?;

    println!("🚀 daq-spool - buffered acquisition");
    println!("   Config: {}", config_path.display());
    println!();

    let enabled = config.enabled_channels();
    if enabled.is_empty() {
        println!("⚠️  No enabled channels in configuration, nothing to acquire");
        return Ok(());
    }

    let mut registry = ChannelRegistry::new(config.consumer.clone(), Arc::new(NoElevation));
    for channel in enabled {
        let source = SineSource::new(channel.dimension, 10.0);
        let path = output_path(
            &config.storage.output_dir,
            &channel.name,
            config.storage.format,
        );
        println!(
            "   Channel {} '{}' -> {}",
            channel.id,
            channel.name,
            path.display()
        );
        let sink = file_sink(config.storage.format, path, channel.dimension);
        registry.add_channel(channel, Box::new(source), sink)?;
    }

    registry.start()?;
    println!();
    match duration {
        Some(secs) => {
            println!("📡 Acquiring on {} channel(s) for {secs}s...", registry.len());
            // A timed run still honors Ctrl+C: whichever finishes first
            // falls through to the graceful drain below.
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = signal::ctrl_c() => {
                    println!("\n🛑 Shutdown signal received, draining buffers...");
                }
            }
        }
        None => {
            println!(
                "📡 Acquiring on {} channel(s) - Press Ctrl+C to stop",
                registry.len()
            );
            signal::ctrl_c().await?;
            println!("\n🛑 Shutdown signal received, draining buffers...");
        }
    }

    let reports = registry.shutdown().await?;
    println!();
    for report in &reports {
        let stats = &report.stats;
        println!(
            "   Channel {} '{}': produced {}, dropped {}, persisted {} in {} batches",
            report.id,
            report.name,
            stats.samples_produced,
            stats.samples_dropped,
            stats.samples_persisted,
            stats.batches_written
        );
        if stats.overflow_episodes > 0 || stats.sink_errors > 0 {
            println!(
                "     ⚠️  {} overflow episode(s), {} sink error(s)",
                stats.overflow_episodes, stats.sink_errors
            );
        }
    }
    println!();
    println!("👋 Acquisition complete");
    Ok(())
}

fn validate_config(config_path: &Path) -> Result<()> {
    let config = SpoolConfig::load_from(config_path)?;
    config.validate()?;

    println!("✅ {} is valid", config_path.display());
    println!(
        "   {} channel(s) configured, {} enabled",
        config.channels.len(),
        config.enabled_channels().len()
    );
    for channel in &config.channels {
        println!(
            "     - {} '{}': dim {}, capacity {}, {} Hz{}",
            channel.id,
            channel.name,
            channel.dimension,
            channel.capacity,
            channel.producer_rate_hz,
            if channel.enabled { "" } else { " (disabled)" }
        );
    }
    Ok(())
}
