//! Destinations that flushed audit records are written to.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::record::AuditRecord;
use pqbridge_common::Result;

/// External store for flushed records.
///
/// Delivery is at least once. A batch that errors or times out is retried
/// in full on the next flush, even if part of it was already persisted, so
/// a sink may receive a record twice. Readers dedupe on
/// [`AuditRecord::sequence`], which is unique per logger.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Persist `records`, oldest first.
    async fn write_batch(&self, records: &[AuditRecord]) -> Result<()>;

    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;
}

/// Keeps flushed records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn write_batch(&self, records: &[AuditRecord]) -> Result<()> {
        self.records.lock().extend_from_slice(records);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LogSink for JsonLinesSink {
    async fn write_batch(&self, records: &[AuditRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}
