//! Persistence sinks for drained sample batches.
//!
//! A [`SampleSink`] brackets one channel's lifetime with a session: `begin`
//! once before the first sample, `append` once per drained sample in order,
//! `finish` once at teardown. The consumer loop owns its sink exclusively
//! and calls it only after releasing the buffer lock, so a slow or stalled
//! sink can never delay the producer.
//!
//! Bundled implementations: [`CsvSink`] (the default storage format),
//! [`BinarySink`] (raw little-endian records), and [`MemorySink`] (in-memory
//! capture for tests and diagnostics).
//!
//! # Example
//!
//! ```
//! use daq_spool::sample::Sample;
//! use daq_spool::sink::{MemorySink, SampleSink};
//!
//! # tokio_test::block_on(async {
//! let mut sink = MemorySink::new();
//! let capture = sink.clone();
//!
//! sink.begin().await.unwrap();
//! sink.append(&Sample::scalar(1, 0.5)).await.unwrap();
//! sink.finish().await.unwrap();
//!
//! assert_eq!(capture.samples().len(), 1);
//! assert!(capture.finished());
//! # });
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpoolError};
use crate::sample::Sample;

/// Ordered, session-bracketed destination for one channel's samples.
#[async_trait]
pub trait SampleSink: Send + Sync {
    /// Open the session (start-of-file). Called once, before any append.
    async fn begin(&mut self) -> Result<()>;

    /// Persist one sample (per-frame write). Samples arrive in buffer order.
    async fn append(&mut self, sample: &Sample) -> Result<()>;

    /// Persist one drained batch in order.
    ///
    /// The default forwards to [`append`](Self::append) sample by sample;
    /// sinks with a cheaper bulk path may override it.
    async fn write_batch(&mut self, batch: &[Sample]) -> Result<()> {
        for sample in batch {
            self.append(sample).await?;
        }
        Ok(())
    }

    /// Close the session (end-of-file). Called once, after the final drain.
    async fn finish(&mut self) -> Result<()>;
}

/// On-disk format for file-backed sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkFormat {
    /// Header row plus one CSV row per sample.
    Csv,
    /// Raw records: u64 timestamp followed by the value vector, little
    /// endian.
    Binary,
}

impl SinkFormat {
    /// Conventional file extension for this format.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            SinkFormat::Csv => "csv",
            SinkFormat::Binary => "bin",
        }
    }
}

/// Build a timestamped output path for a channel, e.g.
/// `data/stage_x_20260822_153000.csv`.
#[must_use]
pub fn output_path(dir: &Path, channel_name: &str, format: SinkFormat) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("{channel_name}_{stamp}.{}", format.extension()))
}

/// Construct a file-backed sink of the requested format.
#[must_use]
pub fn file_sink(format: SinkFormat, path: PathBuf, dimension: usize) -> Box<dyn SampleSink> {
    match format {
        SinkFormat::Csv => Box::new(CsvSink::new(path, dimension)),
        SinkFormat::Binary => Box::new(BinarySink::new(path, dimension)),
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

// =============================================================================
// CsvSink
// =============================================================================

/// CSV file sink: one header row, then one row per sample
/// (`timestamp_ms,v0,v1,...`).
pub struct CsvSink {
    path: PathBuf,
    dimension: usize,
    writer: Option<csv::Writer<File>>,
    samples_written: u64,
}

impl CsvSink {
    /// Create a sink that will write to `path` on `begin`.
    #[must_use]
    pub fn new(path: PathBuf, dimension: usize) -> Self {
        Self {
            path,
            dimension,
            writer: None,
            samples_written: 0,
        }
    }

    /// Samples written so far in this session.
    #[must_use]
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Output file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SampleSink for CsvSink {
    async fn begin(&mut self) -> Result<()> {
        ensure_parent_dir(&self.path)?;
        let file = File::create(&self.path)?;
        let mut writer = csv::Writer::from_writer(file);

        let mut header = Vec::with_capacity(self.dimension + 1);
        header.push("timestamp_ms".to_string());
        for i in 0..self.dimension {
            header.push(format!("v{i}"));
        }
        writer.write_record(&header)?;

        self.writer = Some(writer);
        Ok(())
    }

    async fn append(&mut self, sample: &Sample) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(SpoolError::SinkClosed)?;
        if sample.dimension() != self.dimension {
            return Err(SpoolError::DimensionMismatch {
                expected: self.dimension,
                actual: sample.dimension(),
            });
        }

        let mut record = Vec::with_capacity(self.dimension + 1);
        record.push(sample.timestamp_ms().to_string());
        for v in sample.values() {
            record.push(v.to_string());
        }
        writer.write_record(&record)?;
        self.samples_written += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

// =============================================================================
// BinarySink
// =============================================================================

/// Raw binary sink: per sample, the u64 timestamp then each f64 value,
/// all little endian. Record size is fixed by the channel dimension.
pub struct BinarySink {
    path: PathBuf,
    dimension: usize,
    writer: Option<BufWriter<File>>,
    samples_written: u64,
}

impl BinarySink {
    /// Create a sink that will write to `path` on `begin`.
    #[must_use]
    pub fn new(path: PathBuf, dimension: usize) -> Self {
        Self {
            path,
            dimension,
            writer: None,
            samples_written: 0,
        }
    }

    /// Samples written so far in this session.
    #[must_use]
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Bytes per record for this sink's dimension.
    #[must_use]
    pub fn record_size(&self) -> usize {
        8 + 8 * self.dimension
    }
}

#[async_trait]
impl SampleSink for BinarySink {
    async fn begin(&mut self) -> Result<()> {
        ensure_parent_dir(&self.path)?;
        let file = File::create(&self.path)?;
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    async fn append(&mut self, sample: &Sample) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(SpoolError::SinkClosed)?;
        if sample.dimension() != self.dimension {
            return Err(SpoolError::DimensionMismatch {
                expected: self.dimension,
                actual: sample.dimension(),
            });
        }

        writer.write_all(&sample.timestamp_ms().to_le_bytes())?;
        for v in sample.values() {
            writer.write_all(&v.to_le_bytes())?;
        }
        self.samples_written += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

// =============================================================================
// MemorySink
// =============================================================================

/// In-memory sink capturing everything it receives.
///
/// Cloning shares the underlying storage, so a test can keep one handle
/// while the consumer owns another.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    inner: Arc<Mutex<MemorySinkInner>>,
}

#[derive(Debug, Default)]
struct MemorySinkInner {
    samples: Vec<Sample>,
    batch_sizes: Vec<usize>,
    begun: bool,
    finished: bool,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every sample received so far, in arrival order.
    #[must_use]
    pub fn samples(&self) -> Vec<Sample> {
        self.inner.lock().samples.clone()
    }

    /// Sizes of the batches received so far, in arrival order.
    #[must_use]
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.inner.lock().batch_sizes.clone()
    }

    /// Whether `begin` has been called.
    #[must_use]
    pub fn begun(&self) -> bool {
        self.inner.lock().begun
    }

    /// Whether `finish` has been called.
    #[must_use]
    pub fn finished(&self) -> bool {
        self.inner.lock().finished
    }
}

#[async_trait]
impl SampleSink for MemorySink {
    async fn begin(&mut self) -> Result<()> {
        self.inner.lock().begun = true;
        Ok(())
    }

    async fn append(&mut self, sample: &Sample) -> Result<()> {
        self.inner.lock().samples.push(sample.clone());
        Ok(())
    }

    async fn write_batch(&mut self, batch: &[Sample]) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.batch_sizes.push(batch.len());
        inner.samples.extend_from_slice(batch);
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.inner.lock().finished = true;
        Ok(())
    }
}
