//! File-backed tiered stock pool.
//!
//! Every mutation rewrites the whole snapshot (`{name}_pool.json`) before
//! returning. Entries leaving the pool are appended to the history log
//! (`{name}_pool_hist.jsonl`) first, so nothing is dropped silently.
//!
//! There is no locking: two processes mutating the same pool name can
//! interleave writes.

use chrono::Local;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tma_common::{Config, Error, Result, ResultExt};

use super::history::PoolHistory;
use super::types::{PoolLevel, PoolTiers, StockPoolEntry};

/// Default upstream limit on symbols per quote request
const DEFAULT_BATCH_SIZE: usize = 800;

/// A named three-tier stock pool.
#[derive(Debug)]
pub struct StockPool {
    /// Pool name, used to derive file names
    name: String,
    /// Snapshot file
    path: PathBuf,
    /// History log of removed entries
    history: PoolHistory,
    /// In-memory tiers; equal to the snapshot after every persisted mutation
    tiers: PoolTiers,
    /// Symbols per quote request in performance checks
    pub(crate) batch_size: usize,
}

impl StockPool {
    /// Open a pool under `dir`, restoring its snapshot if one exists.
    ///
    /// A snapshot that exists but cannot be read or parsed is a storage
    /// error; it is never replaced by an empty pool.
    pub fn create_or_restore(name: &str, dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            Error::Storage(format!(
                "Failed to create pool directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let path = dir.join(format!("{}_pool.json", name));
        let history = PoolHistory::new(dir.join(format!("{}_pool_hist.jsonl", name)));

        let tiers = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<PoolTiers>(&content).map_err(|e| {
                Error::Storage(format!(
                    "Corrupt pool snapshot {}: {}",
                    path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => PoolTiers::default(),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to read pool snapshot {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        tracing::debug!(
            pool = %name,
            path = %path.display(),
            entries = tiers.len(),
            "Stock pool opened"
        );

        Ok(Self {
            name: name.to_string(),
            path,
            history,
            tiers,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Open a pool in the configured pool directory.
    pub fn open(name: &str, config: &Config) -> Result<Self> {
        let pool = Self::create_or_restore(name, config.pool_dir())
            .context(format!("Failed to open stock pool '{}'", name))?;
        Ok(pool.with_batch_size(config.collector.quote_batch_size))
    }

    /// Override symbols per quote request.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// History log location
    pub fn history_path(&self) -> &Path {
        self.history.path()
    }

    /// Current in-memory tiers
    pub fn tiers(&self) -> &PoolTiers {
        &self.tiers
    }

    /// Entries of one tier in insertion order
    pub fn entries(&self, level: u8) -> Result<&[StockPoolEntry]> {
        Ok(self.tiers.get(PoolLevel::try_from(level)?))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Append one entry to a tier and persist.
    ///
    /// `added_at` defaults to the current local time. Duplicates are kept.
    pub fn add(
        &mut self,
        code: &str,
        reason: &str,
        level: u8,
        added_at: Option<&str>,
    ) -> Result<()> {
        self.add_many(&[code], reason, level, added_at)
    }

    /// Append one entry per code to a tier and persist once.
    pub fn add_many<S: AsRef<str>>(
        &mut self,
        codes: &[S],
        reason: &str,
        level: u8,
        added_at: Option<&str>,
    ) -> Result<()> {
        let tier = PoolLevel::try_from(level)?;
        let added_at = added_at.map_or_else(now_string, str::to_string);

        let mut staged = self.tiers.clone();
        let entries = staged.get_mut(tier);
        for code in codes {
            entries.push(StockPoolEntry {
                code: code.as_ref().to_string(),
                added_at: added_at.clone(),
                level,
                reason: reason.to_string(),
            });
        }
        self.commit(staged)?;

        tracing::info!(
            pool = %self.name,
            level,
            count = codes.len(),
            reason = %reason,
            "Added entries to stock pool"
        );
        Ok(())
    }

    /// Remove every entry with `code` from a tier.
    ///
    /// The removed entries are archived to the history log before the
    /// snapshot is rewritten. Returns how many entries were removed.
    ///
    /// If the snapshot write fails the pool keeps the entries while the
    /// history already holds them, so a retried removal archives them again.
    pub fn remove(&mut self, code: &str, level: u8) -> Result<usize> {
        let tier = PoolLevel::try_from(level)?;

        let removed: Vec<StockPoolEntry> = self
            .tiers
            .get(tier)
            .iter()
            .filter(|entry| entry.code == code)
            .cloned()
            .collect();

        let mut staged = self.tiers.clone();
        staged.get_mut(tier).retain(|entry| entry.code != code);

        self.history.append(&removed)?;
        self.commit(staged)?;

        tracing::info!(
            pool = %self.name,
            code = %code,
            level,
            removed = removed.len(),
            "Removed entries from stock pool"
        );

        Ok(removed.len())
    }

    /// Read-only lookup of every entry with `code` in a tier.
    pub fn check(&self, code: &str, level: u8) -> Result<Vec<StockPoolEntry>> {
        let tier = PoolLevel::try_from(level)?;
        Ok(self
            .tiers
            .get(tier)
            .iter()
            .filter(|entry| entry.code == code)
            .cloned()
            .collect())
    }

    /// Archive every entry, clear all tiers and rewrite the snapshot.
    pub fn empty_and_persist(&mut self) -> Result<()> {
        let all: Vec<StockPoolEntry> = self.tiers.iter().cloned().collect();
        self.history.append(&all)?;
        self.commit(PoolTiers::default())?;

        tracing::info!(pool = %self.name, archived = all.len(), "Stock pool emptied");
        Ok(())
    }

    /// Archive every entry and clear all tiers, leaving the snapshot untouched.
    ///
    /// The on-disk snapshot still holds the old entries until the next
    /// persisted mutation; reopening the pool before that restores them.
    pub fn empty_in_memory(&mut self) -> Result<()> {
        let all: Vec<StockPoolEntry> = self.tiers.iter().cloned().collect();
        self.history.append(&all)?;
        self.tiers = PoolTiers::default();

        tracing::info!(pool = %self.name, archived = all.len(), "Stock pool emptied");
        Ok(())
    }

    /// Empty the pool; `clear` selects whether the snapshot is rewritten.
    pub fn empty(&mut self, clear: bool) -> Result<()> {
        if clear {
            self.empty_and_persist()
        } else {
            self.empty_in_memory()
        }
    }

    /// Every archived entry, oldest first.
    pub fn restore_history(&self) -> Result<Vec<StockPoolEntry>> {
        self.history.read_all()
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Write `tiers` as the snapshot, then adopt them in memory.
    ///
    /// On a failed write the in-memory tiers are left as they were.
    fn commit(&mut self, tiers: PoolTiers) -> Result<()> {
        self.write_snapshot(&tiers)?;
        self.tiers = tiers;
        Ok(())
    }

    /// Rewrite the snapshot through a temp file and rename.
    fn write_snapshot(&self, tiers: &PoolTiers) -> Result<()> {
        let content = serde_json::to_string_pretty(tiers)?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, content)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                Error::Storage(format!(
                    "Failed to write pool snapshot {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        tracing::debug!(pool = %self.name, entries = tiers.len(), "Stock pool persisted");
        Ok(())
    }
}

fn now_string() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pool(tmp: &TempDir) -> StockPool {
        StockPool::create_or_restore("demo", tmp.path()).unwrap()
    }

    #[test]
    fn test_new_pool_is_empty() {
        let tmp = TempDir::new().unwrap();
        let pool = pool(&tmp);
        assert!(pool.tiers().is_empty());
        assert!(!pool.path().exists());
        assert!(pool.path().ends_with("demo_pool.json"));
    }

    #[test]
    fn test_add_defaults_timestamp() {
        let tmp = TempDir::new().unwrap();
        let mut pool = pool(&tmp);
        pool.add("600682", "breakout", 1, None).unwrap();

        let entries = pool.check("600682", 1).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].added_at.len(), "2024-01-02 09:30:00".len());
        assert_eq!(entries[0].level, 1);
    }

    #[test]
    fn test_invalid_level_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut pool = pool(&tmp);

        assert!(matches!(
            pool.add("600682", "x", 4, None),
            Err(Error::InvalidLevel(4))
        ));
        assert!(matches!(pool.check("600682", 0), Err(Error::InvalidLevel(0))));
        assert!(matches!(pool.remove("600682", 9), Err(Error::InvalidLevel(9))));
        assert!(!pool.path().exists());
    }

    #[test]
    fn test_snapshot_layout() {
        let tmp = TempDir::new().unwrap();
        let mut pool = pool(&tmp);
        pool.add("600000", "breakout", 2, Some("2024-01-02")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(pool.path()).unwrap()).unwrap();
        assert_eq!(raw["level1"], serde_json::json!([]));
        assert_eq!(raw["level2"][0]["code"], "600000");
        assert_eq!(raw["level2"][0]["dt"], "2024-01-02");
        assert_eq!(raw["level2"][0]["level"], 2);
        assert_eq!(raw["level2"][0]["reason"], "breakout");
    }

    #[test]
    fn test_remove_missing_code_archives_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut pool = pool(&tmp);
        pool.add("600000", "breakout", 1, None).unwrap();

        assert_eq!(pool.remove("600001", 1).unwrap(), 0);
        assert!(pool.restore_history().unwrap().is_empty());
        assert_eq!(pool.entries(1).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_in_memory_leaves_snapshot() {
        let tmp = TempDir::new().unwrap();
        let mut pool = pool(&tmp);
        pool.add("600000", "breakout", 1, None).unwrap();

        pool.empty(false).unwrap();
        assert!(pool.tiers().is_empty());
        assert_eq!(pool.restore_history().unwrap().len(), 1);

        let reopened = StockPool::create_or_restore("demo", tmp.path()).unwrap();
        assert_eq!(reopened.tiers().len(), 1);
    }

    #[test]
    fn test_failed_write_keeps_memory_unchanged() {
        let tmp = TempDir::new().unwrap();
        let mut pool = pool(&tmp);
        pool.add("600000", "watch", 1, Some("2024-01-02 09:30:00"))
            .unwrap();

        // A directory in place of the temp file makes the snapshot write fail
        let blocker = tmp.path().join("demo_pool.json.tmp");
        fs::create_dir(&blocker).unwrap();

        let err = pool.remove("600000", 1).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(pool.check("600000", 1).unwrap().len(), 1);

        let err = pool.add("000001", "watch", 2, None).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(pool.entries(2).unwrap().is_empty());

        assert!(pool.empty_and_persist().is_err());
        assert_eq!(pool.tiers().len(), 1);

        fs::remove_dir(&blocker).unwrap();
        assert_eq!(pool.remove("600000", 1).unwrap(), 1);
        assert!(pool.check("600000", 1).unwrap().is_empty());

        let reopened = StockPool::create_or_restore("demo", tmp.path()).unwrap();
        assert_eq!(reopened.tiers().len(), 0);
    }

    #[test]
    fn test_corrupt_snapshot_is_storage_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("demo_pool.json"), "{ level1: [").unwrap();

        let err = StockPool::create_or_restore("demo", tmp.path()).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_open_uses_config_dirs() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            home: Some(tmp.path().to_string_lossy().into_owned()),
            ..Default::default()
        };

        let mut pool = StockPool::open("demo", &config).unwrap();
        pool.add("600000", "x", 3, None).unwrap();
        assert!(tmp.path().join("pool").join("demo_pool.json").exists());
        assert_eq!(pool.batch_size, 800);
    }
}
