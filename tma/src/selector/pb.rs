//! Price-to-book screen over today's market snapshot.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tma_common::{Error, Result};

use super::{ScreenResult, ScreenedShare};
use crate::collector::{apply_filters, Collector, MarketSnapshot, SnapshotFilters};

/// Halted and ST shares never pass
const PB_FILTERS: SnapshotFilters = SnapshotFilters {
    exclude_halted: true,
    exclude_st: true,
};

/// Open PB interval; both bounds are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PbRange {
    pub min: f64,
    pub max: f64,
}

impl Default for PbRange {
    fn default() -> Self {
        Self { min: 0.0, max: 0.8 }
    }
}

impl PbRange {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if min.is_nan() || max.is_nan() || min >= max {
            return Err(Error::Configuration(format!(
                "Invalid PB range ({}, {}): min must be below max",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, pb: f64) -> bool {
        self.min < pb && pb < self.max
    }

    fn reason(&self) -> String {
        format!("市净率介于{}与{}之间", self.min, self.max)
    }
}

/// Shares whose PB lies inside `range`, halted and ST shares excluded.
///
/// Rows without a PB are skipped silently; an empty snapshot is an error
/// from the collector.
pub async fn screen_by_pb(collector: &dyn Collector, range: PbRange) -> Result<ScreenResult> {
    let started = Instant::now();
    let rows = collector.get_market_snapshot(&PB_FILTERS).await?;

    let mut result = filter_by_pb(rows, range);
    result.duration_secs = started.elapsed().as_secs_f64();

    tracing::info!(
        scanned = result.total_scanned,
        hits = result.hits.len(),
        min = range.min,
        max = range.max,
        "PB screen complete"
    );
    Ok(result)
}

fn filter_by_pb(rows: Vec<MarketSnapshot>, range: PbRange) -> ScreenResult {
    // Collectors may return unfiltered rows
    let rows = apply_filters(rows, &PB_FILTERS);
    let reason = range.reason();

    ScreenResult {
        total_scanned: rows.len(),
        hits: rows
            .iter()
            .filter(|row| row.pb.is_some_and(|pb| range.contains(pb)))
            .map(|row| ScreenedShare {
                code: row.code.clone(),
                name: row.name.clone(),
                price: row.trade,
                rule: "PB".to_string(),
                reason: reason.clone(),
            })
            .collect(),
        ..Default::default()
    }
}
