//! JSONL audit log file
//!
//! One entry per line, appended and flushed before the call returns. A
//! missing file reads as an empty log.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use crate::error::{StrongboxError, StrongboxResult};

use super::entry::AuditEntry;

pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    pub fn log(&self, entry: &AuditEntry) -> StrongboxResult<()> {
        self.log_batch(std::slice::from_ref(entry))
    }

    /// Append several entries with a single open and flush
    ///
    /// Every entry is serialized before the file is touched, so an entry that
    /// fails to serialize leaves the log unchanged.
    pub fn log_batch(&self, entries: &[AuditEntry]) -> StrongboxResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let lines = entries
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StrongboxError::Json(format!("Failed to serialize audit entry: {}", e)))?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| StrongboxError::Io(format!("Failed to open audit log: {}", e)))?;
        let mut writer = BufWriter::new(file);
        for line in &lines {
            writeln!(writer, "{}", line)
                .map_err(|e| StrongboxError::Io(format!("Failed to write audit entry: {}", e)))?;
        }
        writer
            .flush()
            .map_err(|e| StrongboxError::Io(format!("Failed to flush audit log: {}", e)))
    }

    /// Every entry, oldest first
    pub fn read_all(&self) -> StrongboxResult<Vec<AuditEntry>> {
        let file = match File::open(&self.log_path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StrongboxError::Io(format!("Failed to open audit log: {}", e))),
        };

        let mut entries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                StrongboxError::Io(format!("Failed to read audit log line {}: {}", index + 1, e))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line).map_err(|e| {
                StrongboxError::Json(format!("Bad audit entry at line {}: {}", index + 1, e))
            })?);
        }
        Ok(entries)
    }
}
