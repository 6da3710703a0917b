//! Append-only history log of entries removed from a pool.
//!
//! One JSON object per line. The file is only ever appended to or read in
//! full; lines that fail to parse are skipped with a warning.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tma_common::{Error, Result};

use super::types::StockPoolEntry;

/// History log for one pool.
#[derive(Debug, Clone)]
pub struct PoolHistory {
    path: PathBuf,
}

impl PoolHistory {
    /// History log at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append entries, one line each.
    pub fn append(&self, entries: &[StockPoolEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                Error::Storage(format!(
                    "Failed to open history log {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        let mut buf = String::new();
        for entry in entries {
            buf.push_str(&serde_json::to_string(entry)?);
            buf.push('\n');
        }

        file.write_all(buf.as_bytes()).map_err(|e| {
            Error::Storage(format!(
                "Failed to append to history log {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(
            path = %self.path.display(),
            count = entries.len(),
            "Archived pool entries"
        );

        Ok(())
    }

    /// Read the whole log, oldest first. A missing log is empty.
    pub fn read_all(&self) -> Result<Vec<StockPoolEntry>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to open history log {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let mut entries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                Error::Storage(format!(
                    "Failed to read history log {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<StockPoolEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = index + 1,
                        error = %e,
                        "Skipping unparsable history line"
                    );
                }
            }
        }

        Ok(entries)
    }
}
