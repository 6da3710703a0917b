//! Limit-board break watch (破板监控).
//!
//! While a share sits on its limit-up board, the bid-1 queue holds it
//! there; on a limit-down board it is the ask-1 queue. When that queue's
//! notional falls below the threshold the board is likely to open, and a
//! single alert is pushed.

use serde::{Deserialize, Serialize};
use tma_common::util::to_wan;
use tma_common::{Error, Result};
use tracing::{debug, info, warn};

use super::{is_transient, LoopSettings};
use crate::collector::Collector;
use crate::indicator::share::order_book_amounts;
use crate::notification::Notifier;

/// Which board is watched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    /// Limit-up (涨停板): watch bid-1
    Up,
    /// Limit-down (跌停板): watch ask-1
    Down,
}

impl LimitKind {
    /// Parse "zt"/"up" or "dt"/"down"
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "zt" | "up" => Ok(Self::Up),
            "dt" | "down" => Ok(Self::Down),
            other => Err(Error::Configuration(format!(
                "Unknown limit kind '{}': expected zt or dt",
                other
            ))),
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Up => "【涨停板 - 破板监控】",
            Self::Down => "【跌停板 - 破板监控】",
        }
    }

    fn queue_label(self) -> &'static str {
        match self {
            Self::Up => "买一总挂单金额",
            Self::Down => "卖一总挂单金额",
        }
    }
}

/// How a watch ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LimitOutcome {
    /// Queue fell below the threshold and an alert was pushed
    Alerted {
        /// Queue notional in CNY at alert time
        amount: f64,
    },
    /// Trading hours ended or the poll budget ran out
    Finished,
}

/// Watches one share's limit-board queue.
#[derive(Debug, Clone)]
pub struct LimitBoardMonitor {
    code: String,
    kind: LimitKind,
    /// Alert threshold in 10k CNY
    threshold_wan: f64,
    settings: LoopSettings,
}

impl LimitBoardMonitor {
    pub fn new(
        code: impl Into<String>,
        kind: LimitKind,
        threshold_wan: f64,
        settings: LoopSettings,
    ) -> Self {
        Self {
            code: code.into(),
            kind,
            threshold_wan,
            settings,
        }
    }

    /// Poll until the queue drops below the threshold or the loop ends.
    ///
    /// Quote failures and failed pushes are retried on the next poll; a
    /// missing notification key aborts.
    pub async fn run(
        &self,
        collector: &dyn Collector,
        notifier: &dyn Notifier,
    ) -> Result<LimitOutcome> {
        info!(
            code = %self.code,
            kind = ?self.kind,
            threshold_wan = self.threshold_wan,
            "开始监控 {}",
            self.kind.title()
        );

        let mut iteration = 0;
        let outcome = loop {
            if !self.settings.should_continue(iteration) {
                break LimitOutcome::Finished;
            }
            iteration += 1;
            tokio::time::sleep(self.settings.interval).await;

            match self.poll(collector, notifier).await {
                Ok(Some(amount)) => break LimitOutcome::Alerted { amount },
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(
                    code = %self.code,
                    transient = is_transient(&e),
                    error = %e,
                    "Limit board poll failed"
                ),
            }
        };

        info!(code = %self.code, outcome = ?outcome, "结束监控 {}", self.kind.title());
        Ok(outcome)
    }

    /// One poll; `Some(amount)` once an alert went out
    async fn poll(
        &self,
        collector: &dyn Collector,
        notifier: &dyn Notifier,
    ) -> Result<Option<f64>> {
        let quote = collector.get_quote(&self.code).await?;
        let (buy_first, sell_first) = order_book_amounts(&quote);
        let amount = match self.kind {
            LimitKind::Up => buy_first,
            LimitKind::Down => sell_first,
        };

        debug!(code = %self.code, amount_wan = to_wan(amount), "{}", self.kind.queue_label());

        if amount / 10_000.0 >= self.threshold_wan {
            return Ok(None);
        }

        let title = format!("{} - {} 即将破板", self.kind.title(), self.code);
        let content = format!(
            "{}: {}万元，低于阈值（{}万元）",
            self.kind.queue_label(),
            to_wan(amount),
            self.threshold_wan
        );
        notifier.push(&title, &content).await?;

        Ok(Some(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(LimitKind::parse("zt").unwrap(), LimitKind::Up);
        assert_eq!(LimitKind::parse("DT").unwrap(), LimitKind::Down);
        assert!(LimitKind::parse("x").unwrap_err().is_configuration());
    }
}
