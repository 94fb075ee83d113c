//! Append-only notification log.
//!
//! The log is a single JSON array on disk. Appending reads the existing
//! array, extends it and writes it back via a temp file + rename, so a crash
//! mid-write leaves the previous log intact.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use super::NotificationRecord;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to access notification log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize notification log: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("notification log {path} is not a JSON array; refusing to overwrite it")]
    Corrupt { path: PathBuf },
}

/// Durable destination for composed notifications.
pub trait NotificationSink: Send + Sync {
    /// Append `records`, preserving everything already logged.
    /// Returns how many records were appended.
    fn append(&self, records: &[NotificationRecord]) -> Result<usize, SinkError>;
}

/// File-backed JSON array log.
#[derive(Debug, Clone)]
pub struct JsonLogSink {
    path: PathBuf,
}

impl JsonLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry in the log. A missing file is an empty log.
    ///
    /// Entries are returned as raw JSON so older or hand-edited entries with a
    /// different shape are preserved untouched.
    pub fn read_all(&self) -> Result<Vec<Value>, SinkError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SinkError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(entries)) => Ok(entries),
            _ => Err(SinkError::Corrupt {
                path: self.path.clone(),
            }),
        }
    }

    /// One page of the log, oldest first.
    pub fn page(&self, page: usize, per_page: usize) -> Result<LogPage, SinkError> {
        Ok(LogPage::slice(self.read_all()?, page, per_page))
    }

    fn write_all(&self, entries: &[Value]) -> Result<(), SinkError> {
        let io_err = |source| SinkError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl NotificationSink for JsonLogSink {
    fn append(&self, records: &[NotificationRecord]) -> Result<usize, SinkError> {
        let mut entries = self.read_all()?;
        let existing = entries.len();
        for record in records {
            entries.push(serde_json::to_value(record)?);
        }
        self.write_all(&entries)?;

        info!(
            path = %self.path.display(),
            appended = records.len(),
            total = entries.len(),
            "Saved notification log"
        );
        debug!(existing, "Previous log entries preserved");
        Ok(records.len())
    }
}

/// In-memory sink for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<NotificationRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<NotificationRecord> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl NotificationSink for MemorySink {
    fn append(&self, records: &[NotificationRecord]) -> Result<usize, SinkError> {
        let mut guard = self
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.extend_from_slice(records);
        Ok(records.len())
    }
}

/// A page of log entries.
#[derive(Debug, Clone, Serialize)]
pub struct LogPage {
    pub logs: Vec<Value>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

impl LogPage {
    /// `page` is 1-based; zero values are clamped to 1.
    pub fn slice(entries: Vec<Value>, page: usize, per_page: usize) -> Self {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total = entries.len();
        let total_pages = total.div_ceil(per_page);
        let logs = entries
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();

        Self {
            logs,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}
