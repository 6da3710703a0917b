//! Polling monitors.
//!
//! Every monitor runs the same loop: sleep a fixed interval, poll, repeat
//! while the exchange is open. A failed poll is logged and the next one
//! proceeds; storage and configuration errors end the loop.

pub mod limit;
pub mod market;
pub mod pool;

pub use limit::{LimitBoardMonitor, LimitKind, LimitOutcome};
pub use market::{market_status, render_limit_boards, render_market_status};
pub use pool::PoolMonitor;

use chrono::{Datelike, Local, NaiveDateTime, NaiveTime, Weekday};
use std::time::Duration;
use tma_common::Error;

/// Whether `now` falls in an A-share continuous trading session.
///
/// Weekdays 09:30-11:30 and 13:00-15:00, bounds inclusive. Exchange
/// holidays are not known here.
pub fn is_trading_time(now: NaiveDateTime) -> bool {
    if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }

    let t = now.time();
    let session = |start: (u32, u32), end: (u32, u32)| {
        match (
            NaiveTime::from_hms_opt(start.0, start.1, 0),
            NaiveTime::from_hms_opt(end.0, end.1, 0),
        ) {
            (Some(start), Some(end)) => t >= start && t <= end,
            _ => false,
        }
    };

    session((9, 30), (11, 30)) || session((13, 0), (15, 0))
}

/// Network and upstream hiccups usually clear by the next poll
fn is_transient(error: &Error) -> bool {
    match error {
        Error::Collector(e) => e.is_recoverable(),
        Error::Notification(_) => true,
        _ => false,
    }
}

/// Loop control shared by monitors.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Sleep before each poll
    pub interval: Duration,
    /// Stop after this many polls
    pub max_iterations: Option<usize>,
    /// Stop once outside trading hours
    pub trading_hours_only: bool,
}

impl LoopSettings {
    /// Poll every `interval_secs` while the market is open
    pub fn every(interval_secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs),
            max_iterations: None,
            trading_hours_only: true,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Keep polling outside trading hours
    pub fn ignore_trading_hours(mut self) -> Self {
        self.trading_hours_only = false;
        self
    }

    /// Whether poll number `iteration` (0-based) should run
    fn should_continue(&self, iteration: usize) -> bool {
        if self.max_iterations.is_some_and(|max| iteration >= max) {
            return false;
        }
        !self.trading_hours_only || is_trading_time(Local::now().naive_local())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(date: (i32, u32, u32), h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_trading_time_sessions() {
        // 2024-01-02 is a Tuesday
        let day = (2024, 1, 2);
        assert!(!is_trading_time(at(day, 9, 29)));
        assert!(is_trading_time(at(day, 9, 30)));
        assert!(is_trading_time(at(day, 11, 30)));
        assert!(!is_trading_time(at(day, 12, 0)));
        assert!(is_trading_time(at(day, 13, 0)));
        assert!(is_trading_time(at(day, 15, 0)));
        assert!(!is_trading_time(at(day, 15, 1)));
    }

    #[test]
    fn test_trading_time_weekend() {
        // 2024-01-06 is a Saturday
        assert!(!is_trading_time(at((2024, 1, 6), 10, 0)));
        assert!(!is_trading_time(at((2024, 1, 7), 14, 0)));
    }

    #[test]
    fn test_transient_errors() {
        use tma_common::CollectorError;

        assert!(is_transient(&CollectorError::Network("reset".into()).into()));
        assert!(!is_transient(&CollectorError::InvalidRequest("x".into()).into()));
        assert!(!is_transient(&Error::EmptyTier(1)));
    }

    #[test]
    fn test_loop_settings_iterations() {
        let settings = LoopSettings::every(0)
            .with_max_iterations(2)
            .ignore_trading_hours();
        assert!(settings.should_continue(0));
        assert!(settings.should_continue(1));
        assert!(!settings.should_continue(2));
    }
}
