//! TMA - Tools for Market A.
//!
//! Toolkit for Chinese A-share markets:
//! - Tiered stock pools persisted as JSON snapshots with a JSONL history
//! - Per-instrument and whole-market indicator aggregation
//! - Limit-board and pool performance monitors with push notifications
//! - Moving-average and price-to-book share screens feeding the pool
//!
//! Market data is consumed through the [`collector::Collector`] trait;
//! [`collector::EastmoneyCollector`] is the bundled HTTP adapter.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod collector;
pub mod indicator;
pub mod monitor;
pub mod notification;
pub mod pool;
pub mod selector;

pub use collector::{Collector, EastmoneyCollector};
pub use indicator::{
    IndicatorReport, IndicatorSet, IndicatorValue, MarketDayIndicator, ShareDayIndicator,
    ShareTarget,
};
pub use monitor::{LimitBoardMonitor, LimitKind, LimitOutcome, LoopSettings, PoolMonitor};
pub use notification::{Notifier, ServerChanClient};
pub use pool::{PoolLevel, StockPool, StockPoolEntry, TierPerformance};
pub use selector::{MaRule, MaShareScreen, ScreenResult, ScreenedShare};
