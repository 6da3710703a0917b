//! Tier performance: how many pool members are up on the day.

use serde::{Deserialize, Serialize};
use tma_common::util::round_to;
use tma_common::{Error, Result};

use super::store::StockPool;
use super::types::PoolLevel;
use crate::collector::Collector;

/// Up/down breadth of one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierPerformance {
    /// Members priced above previous close
    pub up_nums: usize,
    /// Members priced below previous close
    pub down_nums: usize,
    /// Members with a traded price (halted members excluded)
    pub total_nums: usize,
    /// up_nums / total_nums, 4 decimals
    pub up_rate: f64,
}

impl StockPool {
    /// Fetch quotes for every distinct code in a tier and count gainers.
    ///
    /// Quotes are requested in chunks of the configured batch size. Halted
    /// members have no change and are left out of every count. A tier with
    /// no members, or with no traded member, is an [`Error::EmptyTier`].
    /// Collector failures propagate.
    pub async fn check_performance(
        &self,
        level: u8,
        collector: &dyn Collector,
    ) -> Result<TierPerformance> {
        let tier = PoolLevel::try_from(level)?;

        let mut codes: Vec<String> = Vec::new();
        for entry in self.tiers().get(tier) {
            if !codes.contains(&entry.code) {
                codes.push(entry.code.clone());
            }
        }

        if codes.is_empty() {
            return Err(Error::EmptyTier(level));
        }

        let mut quotes = Vec::with_capacity(codes.len());
        for chunk in codes.chunks(self.batch_size) {
            quotes.extend(collector.get_quotes(chunk).await?);
        }

        let quoted = quotes.len();
        quotes.retain(|q| !q.is_halted());

        let total_nums = quotes.len();
        if total_nums == 0 {
            return Err(Error::EmptyTier(level));
        }

        let up_nums = quotes.iter().filter(|q| q.is_up()).count();
        let down_nums = quotes.iter().filter(|q| q.is_down()).count();
        let up_rate = round_to(up_nums as f64 / total_nums as f64, 4);

        tracing::debug!(
            pool = %self.name(),
            level,
            up_nums,
            down_nums,
            total_nums,
            halted = quoted - total_nums,
            "Checked tier performance"
        );

        Ok(TierPerformance {
            up_nums,
            down_nums,
            total_nums,
            up_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{Kline, KlineFreq, MarketSnapshot, Quote, SnapshotFilters, Tick};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tma_common::CollectorError;

    /// Quotes every requested code at a price derived from its last digit.
    struct DigitCollector {
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Collector for DigitCollector {
        fn name(&self) -> &'static str {
            "digit"
        }

        async fn get_klines(
            &self,
            _code: &str,
            _freq: KlineFreq,
            _start_date: Option<NaiveDate>,
        ) -> std::result::Result<Vec<Kline>, CollectorError> {
            Ok(Vec::new())
        }

        async fn get_ticks(
            &self,
            _code: &str,
            _date: Option<NaiveDate>,
        ) -> std::result::Result<Vec<Tick>, CollectorError> {
            Ok(Vec::new())
        }

        async fn get_quotes(
            &self,
            codes: &[String],
        ) -> std::result::Result<Vec<Quote>, CollectorError> {
            self.batches.lock().unwrap().push(codes.len());
            Ok(codes
                .iter()
                .map(|code| {
                    let digit = code.chars().last().and_then(|c| c.to_digit(10)).unwrap_or(0);
                    Quote {
                        code: code.clone(),
                        price: 10.0 + (digit % 3) as f64 - 1.0,
                        pre_close: 10.0,
                        ..Default::default()
                    }
                })
                .collect())
        }

        async fn get_market_snapshot(
            &self,
            _filters: &SnapshotFilters,
        ) -> std::result::Result<Vec<MarketSnapshot>, CollectorError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_duplicates_counted_once_and_batched() {
        let tmp = TempDir::new().unwrap();
        let mut pool = StockPool::create_or_restore("perf", tmp.path())
            .unwrap()
            .with_batch_size(2);

        // last digit % 3: 0 -> down, 1 -> flat, 2 -> up
        pool.add_many(&["600000", "600001", "600002", "600005"], "x", 1, None)
            .unwrap();
        pool.add("600002", "again", 1, None).unwrap();

        let collector = DigitCollector {
            batches: Mutex::new(Vec::new()),
        };
        let perf = pool.check_performance(1, &collector).await.unwrap();

        assert_eq!(perf.total_nums, 4);
        assert_eq!(perf.up_nums, 2);
        assert_eq!(perf.down_nums, 1);
        assert_eq!(perf.up_rate, 0.5);
        assert_eq!(*collector.batches.lock().unwrap(), vec![2, 2]);
    }

    #[tokio::test]
    async fn test_halted_members_not_counted() {
        let tmp = TempDir::new().unwrap();
        let mut pool = StockPool::create_or_restore("perf", tmp.path()).unwrap();
        // 600003 would quote down at 9.0; it is halted instead
        pool.add_many(&["600002", "600003"], "x", 1, None).unwrap();

        struct HaltedCollector(DigitCollector);

        #[async_trait]
        impl Collector for HaltedCollector {
            fn name(&self) -> &'static str {
                "halted"
            }

            async fn get_klines(
                &self,
                code: &str,
                freq: KlineFreq,
                start_date: Option<NaiveDate>,
            ) -> std::result::Result<Vec<Kline>, CollectorError> {
                self.0.get_klines(code, freq, start_date).await
            }

            async fn get_ticks(
                &self,
                code: &str,
                date: Option<NaiveDate>,
            ) -> std::result::Result<Vec<Tick>, CollectorError> {
                self.0.get_ticks(code, date).await
            }

            async fn get_quotes(
                &self,
                codes: &[String],
            ) -> std::result::Result<Vec<Quote>, CollectorError> {
                let mut quotes = self.0.get_quotes(codes).await?;
                for q in quotes.iter_mut().filter(|q| q.code == "600003") {
                    q.price = 0.0;
                }
                Ok(quotes)
            }

            async fn get_market_snapshot(
                &self,
                filters: &SnapshotFilters,
            ) -> std::result::Result<Vec<MarketSnapshot>, CollectorError> {
                self.0.get_market_snapshot(filters).await
            }
        }

        let collector = HaltedCollector(DigitCollector {
            batches: Mutex::new(Vec::new()),
        });
        let perf = pool.check_performance(1, &collector).await.unwrap();

        assert_eq!(perf.total_nums, 1);
        assert_eq!(perf.up_nums, 1);
        assert_eq!(perf.down_nums, 0);
        assert_eq!(perf.up_rate, 1.0);
    }

    #[tokio::test]
    async fn test_empty_tier_is_error() {
        let tmp = TempDir::new().unwrap();
        let pool = StockPool::create_or_restore("perf", tmp.path()).unwrap();
        let collector = DigitCollector {
            batches: Mutex::new(Vec::new()),
        };

        let err = pool.check_performance(2, &collector).await.unwrap_err();
        assert!(matches!(err, Error::EmptyTier(2)));
        assert!(collector.batches.lock().unwrap().is_empty());
    }
}
