//! Durable snapshot file.
//!
//! The file is JSON: a write timestamp plus every cached sample in address
//! order. Each write replaces the whole file through a temporary file in the
//! same directory and a rename, so readers see either the previous snapshot
//! or the new one.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cache::SnapshotMap;
use super::sample::Sample;
use crate::error::{Result, TelemetryError};

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    written_at: DateTime<Utc>,
    devices: Vec<Sample>,
}

/// Reads and writes the snapshot file at one path
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file contents with `snapshot`
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the directory, temporary file or rename
    /// fails. The previous file is left intact in that case.
    pub fn write(&self, snapshot: &SnapshotMap) -> Result<()> {
        let file = SnapshotFile {
            written_at: Utc::now(),
            devices: snapshot.values().cloned().collect(),
        };
        let content = serde_json::to_vec_pretty(&file)
            .map_err(|e| TelemetryError::Persistence(format!("failed to serialize snapshot: {}", e)))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.persistence_error("create directory", e))?;

        let tmp_path = self.create_temp_file(&dir, &content)?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(self.persistence_error("rename", e));
        }
        if let Ok(dir_file) = File::open(&dir) {
            let _ = dir_file.sync_all();
        }

        debug!(
            "Wrote snapshot of {} devices to {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Load the snapshot at this store's path
    pub fn read(&self) -> Result<SnapshotMap> {
        Self::read_from(&self.path)
    }

    /// Load a snapshot file
    ///
    /// # Errors
    ///
    /// - `SnapshotNotFound` if the file does not exist
    /// - `SnapshotFormat` if it cannot be parsed
    /// - `Io` for other read failures
    pub fn read_from<P: AsRef<Path>>(path: P) -> Result<SnapshotMap> {
        let path = path.as_ref();
        let content = match fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TelemetryError::SnapshotNotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let file: SnapshotFile = serde_json::from_slice(&content)?;
        Ok(file
            .devices
            .into_iter()
            .map(|sample| (*sample.address(), sample))
            .collect())
    }

    fn create_temp_file(&self, dir: &Path, content: &[u8]) -> Result<PathBuf> {
        let base = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("snapshot.json");

        let mut counter = 0u32;
        loop {
            let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(mut tmp) => {
                    let written = tmp
                        .write_all(content)
                        .and_then(|_| tmp.flush())
                        .and_then(|_| tmp.sync_all());
                    if let Err(e) = written {
                        let _ = fs::remove_file(&candidate);
                        return Err(self.persistence_error("write temporary file", e));
                    }
                    return Ok(candidate);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    counter = counter.saturating_add(1);
                }
                Err(e) => return Err(self.persistence_error("create temporary file", e)),
            }
        }
    }

    fn persistence_error(&self, action: &str, e: std::io::Error) -> TelemetryError {
        TelemetryError::Persistence(format!(
            "failed to {} for {}: {}",
            action,
            self.path.display(),
            e
        ))
    }
}
