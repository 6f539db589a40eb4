//! Attendance store - append-only JSONL log with range counts
//!
//! Records are written in JSONL format (one JSON object per line) to the
//! file specified in config. The store supports exactly two operations:
//! append a record, and count records whose timestamp falls inside a
//! closed interval. Nothing is ever updated or deleted.

use crate::domain::types::AttendanceRecord;
use crate::infra::error::StoreError;
use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Storage interface for attendance records
pub trait AttendanceStore: Send + Sync {
    fn append(&self, record: &AttendanceRecord) -> Result<(), StoreError>;

    /// Count records with `from <= at <= to` (both bounds inclusive)
    fn count_in_range(
        &self,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> Result<usize, StoreError>;
}

/// File-backed store, one serialized record per line
pub struct JsonlStore {
    file_path: PathBuf,
    // Serializes append/scan pairs so a count never sees a torn line
    lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        info!(file_path = %file_path.display(), "store_initialized");
        Self { file_path, lock: Mutex::new(()) }
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        // Create parent directories if they don't exist
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.file_path)?;
        writeln!(file, "{}", line)?;
        debug!(file = %self.file_path.display(), bytes = %line.len(), "store_appended");

        Ok(())
    }
}

impl AttendanceStore for JsonlStore {
    fn append(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;

        let _guard = self.lock.lock();
        self.append_line(&json)?;
        Ok(())
    }

    fn count_in_range(
        &self,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> Result<usize, StoreError> {
        let _guard = self.lock.lock();

        let content = match std::fs::read_to_string(&self.file_path) {
            Ok(content) => content,
            // An empty log is a valid log
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut count = 0;
        for line in content.lines() {
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<AttendanceRecord>(line) {
                Ok(record) => {
                    if record.at >= from && record.at <= to {
                        count += 1;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "store_skipping_malformed_line");
                }
            }
        }

        Ok(count)
    }
}
