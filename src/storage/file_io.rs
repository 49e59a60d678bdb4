//! File I/O with atomic writes
//!
//! Every store file and the settings file are replaced whole: the new
//! contents go to a sibling temp file, are synced, and are renamed over the
//! target. A reader sees the old file or the new one, never a mix.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{StrongboxError, StrongboxResult};

fn storage_error(action: &str, path: &Path, e: impl std::fmt::Display) -> StrongboxError {
    StrongboxError::Storage(format!("Failed to {} {}: {}", action, path.display(), e))
}

/// Read a JSON file, or the default value when it does not exist yet
pub fn read_json<T, P>(path: P) -> StrongboxResult<T>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Ok(T::default());
    }

    let file = File::open(path).map_err(|e| storage_error("open", path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| storage_error("parse", path, e))
}

/// Temp file next to `path`, so the final rename stays on one filesystem
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write JSON to a file atomically (write to temp, sync, then rename)
pub fn write_json_atomic<T, P>(path: P, data: &T) -> StrongboxResult<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| storage_error("create directory", parent, e))?;
    }

    let temp = temp_path(path);
    let result = (|| {
        let file = File::create(&temp).map_err(|e| storage_error("create", &temp, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, data)
            .map_err(|e| storage_error("serialize", path, e))?;
        writer.flush().map_err(|e| storage_error("flush", &temp, e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| storage_error("sync", &temp, e))?;
        fs::rename(&temp, path).map_err(|e| storage_error("replace", path, e))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}
