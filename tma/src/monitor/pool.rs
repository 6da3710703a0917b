//! Tier performance polling.

use tma_common::util::format_percent;
use tma_common::Result;
use tracing::{info, warn};

use super::{is_transient, LoopSettings};
use crate::collector::Collector;
use crate::pool::{PoolLevel, StockPool, TierPerformance};

/// Polls one pool tier's performance at a fixed interval.
#[derive(Debug, Clone)]
pub struct PoolMonitor {
    level: u8,
    settings: LoopSettings,
}

impl PoolMonitor {
    /// Fails with `InvalidLevel` unless `level` names a tier.
    pub fn new(level: u8, settings: LoopSettings) -> Result<Self> {
        let level = PoolLevel::try_from(level)?.as_u8();
        Ok(Self { level, settings })
    }

    /// Run until the loop ends; returns every successful reading.
    ///
    /// Failed polls (including an empty tier) are logged and skipped;
    /// fatal errors abort.
    pub async fn run(
        &self,
        pool: &StockPool,
        collector: &dyn Collector,
    ) -> Result<Vec<TierPerformance>> {
        info!(pool = %pool.name(), level = self.level, "Pool monitor started");

        let mut readings = Vec::new();
        let mut iteration = 0;

        while self.settings.should_continue(iteration) {
            iteration += 1;
            tokio::time::sleep(self.settings.interval).await;

            match pool.check_performance(self.level, collector).await {
                Ok(perf) => {
                    info!(
                        pool = %pool.name(),
                        level = self.level,
                        up = perf.up_nums,
                        down = perf.down_nums,
                        total = perf.total_nums,
                        up_rate = %format_percent(perf.up_rate),
                        "Tier performance"
                    );
                    readings.push(perf);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(
                    pool = %pool.name(),
                    level = self.level,
                    transient = is_transient(&e),
                    error = %e,
                    "Pool poll failed"
                ),
            }
        }

        info!(pool = %pool.name(), polls = iteration, "Pool monitor finished");
        Ok(readings)
    }
}
