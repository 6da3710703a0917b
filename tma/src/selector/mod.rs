//! Share screens that feed the stock pool.
//!
//! - [`MaShareScreen`]: moving-average rules `SS01`..`SS03` over a code list
//! - [`screen_by_pb`]: price-to-book band over the market snapshot
//!
//! Hits go into a pool tier through [`add_to_pool`], one batch per reason.

mod ma;
mod pb;

pub use ma::{MaRule, MaShareScreen};
pub use pb::{screen_by_pb, PbRange};

use serde::Serialize;
use tma_common::Result;

use crate::indicator::IndicatorFailure;
use crate::pool::{PoolLevel, StockPool};

// ============================================================================
// Screen Result
// ============================================================================

/// A share that matched one screen rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenedShare {
    pub code: String,
    pub name: String,
    /// Last price when screened
    pub price: f64,
    /// Rule id ("SS01", "PB")
    pub rule: String,
    /// Pool reason recorded for the hit
    pub reason: String,
}

/// Hits and skipped codes of one screening run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScreenResult {
    /// Hits, grouped by rule in rule order
    pub hits: Vec<ScreenedShare>,
    /// Codes that could not be evaluated
    pub failures: Vec<IndicatorFailure>,
    /// Codes looked at, failures included
    pub total_scanned: usize,
    pub duration_secs: f64,
}

impl ScreenResult {
    /// Record a code that could not be evaluated and log it
    pub fn record_failure(&mut self, code: impl Into<String>, error: impl Into<String>) {
        let code = code.into();
        let error = error.into();
        tracing::warn!(code = %code, error = %error, "Share skipped by screen");
        self.failures.push(IndicatorFailure { scope: code, error });
    }

    /// Distinct hit codes in first-hit order.
    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = Vec::new();
        for hit in &self.hits {
            if !codes.contains(&hit.code.as_str()) {
                codes.push(hit.code.as_str());
            }
        }
        codes
    }

    /// Summary string for logging.
    pub fn summary(&self) -> String {
        format!(
            "Screened {} shares in {:.1}s: {} hits, {} failed",
            self.total_scanned,
            self.duration_secs,
            self.hits.len(),
            self.failures.len()
        )
    }
}

// ============================================================================
// Pool Feed
// ============================================================================

/// Add every hit to tier `level`, one `add_many` per distinct reason.
///
/// A share hit by several rules is added once per rule. Returns the number
/// of entries added.
pub fn add_to_pool(pool: &mut StockPool, hits: &[ScreenedShare], level: u8) -> Result<usize> {
    PoolLevel::try_from(level)?;

    let mut batches: Vec<(&str, Vec<&str>)> = Vec::new();
    for hit in hits {
        match batches.iter_mut().find(|(reason, _)| *reason == hit.reason) {
            Some((_, codes)) => codes.push(hit.code.as_str()),
            None => batches.push((hit.reason.as_str(), vec![hit.code.as_str()])),
        }
    }

    for (reason, codes) in &batches {
        pool.add_many(codes.as_slice(), reason, level, None)?;
    }

    tracing::info!(
        pool = %pool.name(),
        level,
        batches = batches.len(),
        added = hits.len(),
        "Screen hits added to pool"
    );
    Ok(hits.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tma_common::Error;

    fn hit(code: &str, rule: &str, reason: &str) -> ScreenedShare {
        ScreenedShare {
            code: code.into(),
            name: format!("N{}", code),
            price: 10.0,
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    #[test]
    fn test_add_to_pool_batches_by_reason() {
        let tmp = TempDir::new().unwrap();
        let mut pool = StockPool::create_or_restore("screen", tmp.path()).unwrap();
        let hits = vec![
            hit("600001", "SS01", "below MA5"),
            hit("600002", "SS02", "MA5 meets MA10"),
            hit("600003", "SS01", "below MA5"),
        ];

        assert_eq!(add_to_pool(&mut pool, &hits, 2).unwrap(), 3);

        let entries = pool.entries(2).unwrap();
        let listed: Vec<(&str, &str)> = entries
            .iter()
            .map(|e| (e.code.as_str(), e.reason.as_str()))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("600001", "below MA5"),
                ("600003", "below MA5"),
                ("600002", "MA5 meets MA10"),
            ]
        );
        assert!(entries.iter().all(|e| e.level == 2));
    }

    #[test]
    fn test_add_to_pool_rejects_level_before_writing() {
        let tmp = TempDir::new().unwrap();
        let mut pool = StockPool::create_or_restore("screen", tmp.path()).unwrap();

        let err = add_to_pool(&mut pool, &[], 4).unwrap_err();
        assert!(matches!(err, Error::InvalidLevel(4)));
        assert_eq!(add_to_pool(&mut pool, &[], 1).unwrap(), 0);
        assert!(pool.tiers().is_empty());
    }

    #[test]
    fn test_codes_are_distinct() {
        let result = ScreenResult {
            hits: vec![
                hit("600002", "SS01", "a"),
                hit("600001", "SS02", "b"),
                hit("600002", "SS02", "b"),
            ],
            ..Default::default()
        };

        assert_eq!(result.codes(), vec!["600002", "600001"]);
        assert!(result.summary().contains("3 hits"));
    }
}
