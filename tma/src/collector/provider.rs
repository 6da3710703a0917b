//! Collector abstraction consumed by the pool store, indicators and monitors.

use async_trait::async_trait;
use chrono::NaiveDate;
use tma_common::CollectorError;

use super::{Kline, KlineFreq, MarketSnapshot, Quote, SnapshotFilters, Tick};

/// Trait for market data sources.
///
/// Calls are slow and may fail with network conditions; callers treat any
/// failure as propagating unless they explicitly run a best-effort loop.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Source name (e.g., "eastmoney")
    fn name(&self) -> &'static str;

    /// Fetch K-lines in ascending date order.
    ///
    /// # Arguments
    /// * `code` - Ticker, bare ("600000") or exchange-decorated
    /// * `freq` - Bar period
    /// * `start_date` - Optional first date; `None` fetches the full history
    async fn get_klines(
        &self,
        code: &str,
        freq: KlineFreq,
        start_date: Option<NaiveDate>,
    ) -> Result<Vec<Kline>, CollectorError>;

    /// Fetch the executed trades of one session in time order.
    ///
    /// `None` means today's session.
    async fn get_ticks(
        &self,
        code: &str,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Tick>, CollectorError>;

    /// Fetch real-time quotes for a batch of codes.
    ///
    /// Implementations may cap the batch size; callers chunk their requests.
    async fn get_quotes(&self, codes: &[String]) -> Result<Vec<Quote>, CollectorError>;

    /// Fetch one real-time quote including level-1 order book.
    async fn get_quote(&self, code: &str) -> Result<Quote, CollectorError> {
        self.get_quotes(&[code.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CollectorError::DataNotAvailable(format!("No quote for {}", code)))
    }

    /// Fetch today's snapshot of the whole exchange.
    async fn get_market_snapshot(
        &self,
        filters: &SnapshotFilters,
    ) -> Result<Vec<MarketSnapshot>, CollectorError>;
}
