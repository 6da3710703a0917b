//! Daily whole-market indicators.
//!
//! Consumes the exchange snapshot with halted instruments already removed
//! and produces:
//!
//! - `M001`..`M005`: breadth over every instrument
//! - `M006`..`M008`: breadth over the top-N turnover instruments
//! - `M009`..`M012`: limit-up counts and hold rate
//! - `M013`..`M016`: limit-down counts and hold rate
//!
//! # Limit Classification
//!
//! An instrument reaches the up band when `high > settlement × up_ratio`.
//! Among those:
//!
//! - `high > trade` ⇒ touched but opened (盘中触及涨停板)
//! - `high == low` ⇒ one-word board (一字涨停板)
//! - `high == trade` ⇒ closed at the limit (涨停板)
//!
//! The down side mirrors this with `low < settlement × down_ratio`.

use serde::{Deserialize, Serialize};
use tma_common::util::round_to;
use tma_common::{Error, IndicatorConfig, Result};

use super::IndicatorReport;
use crate::collector::{Collector, MarketSnapshot, SnapshotFilters};

/// Change percent beyond which a move counts as large
const BIG_MOVE_PERCENT: f64 = 3.0;

// ============================================================================
// Limit Bands
// ============================================================================

/// Limit band multipliers applied to the settlement price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitBand {
    /// Limit-up multiplier (1.095 = +9.5%)
    pub up_ratio: f64,
    /// Limit-down multiplier (0.905 = -9.5%)
    pub down_ratio: f64,
}

impl Default for LimitBand {
    fn default() -> Self {
        Self {
            up_ratio: 1.095,
            down_ratio: 0.905,
        }
    }
}

impl LimitBand {
    pub fn from_config(config: &IndicatorConfig) -> Self {
        Self {
            up_ratio: config.limit_up_ratio,
            down_ratio: config.limit_down_ratio,
        }
    }

    /// Classify against the up band.
    pub fn classify_up(&self, row: &MarketSnapshot) -> LimitStatus {
        if row.settlement <= 0.0 || row.high <= row.settlement * self.up_ratio {
            return LimitStatus::Untouched;
        }

        if row.high > row.trade {
            LimitStatus::TouchedOpened
        } else if row.high == row.low {
            LimitStatus::OneWord
        } else if row.high == row.trade {
            LimitStatus::Closed
        } else {
            LimitStatus::Untouched
        }
    }

    /// Classify against the down band.
    pub fn classify_down(&self, row: &MarketSnapshot) -> LimitStatus {
        if row.settlement <= 0.0 || row.low >= row.settlement * self.down_ratio {
            return LimitStatus::Untouched;
        }

        if row.trade > row.low {
            LimitStatus::TouchedOpened
        } else if row.high == row.low {
            LimitStatus::OneWord
        } else if row.low == row.trade {
            LimitStatus::Closed
        } else {
            LimitStatus::Untouched
        }
    }
}

/// Limit board state of one instrument in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitStatus {
    /// Never reached the band
    Untouched,
    /// Reached the band and traded away from it
    TouchedOpened,
    /// Traded at the limit all session
    OneWord,
    /// Closed at the limit after trading within the band
    Closed,
}

/// Limit direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitDirection {
    Up,
    Down,
}

/// One instrument at or through a limit band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitBoardEntry {
    pub code: String,
    pub name: String,
    pub trade: f64,
    pub direction: LimitDirection,
    pub status: LimitStatus,
    pub turnover_ratio: f64,
    pub change_percent: f64,
}

impl LimitBoardEntry {
    /// Board label ("涨停板", "一字跌停板", ...)
    pub fn kind(&self) -> &'static str {
        match (self.direction, self.status) {
            (LimitDirection::Up, LimitStatus::Closed) => "涨停板",
            (LimitDirection::Up, LimitStatus::OneWord) => "一字涨停板",
            (LimitDirection::Up, _) => "盘中触及涨停板",
            (LimitDirection::Down, LimitStatus::Closed) => "跌停板",
            (LimitDirection::Down, LimitStatus::OneWord) => "一字跌停板",
            (LimitDirection::Down, _) => "盘中触及跌停板",
        }
    }
}

/// Every instrument that reached a limit band, grouped by direction then status.
///
/// Zero-volume rows are ignored even if the caller did not filter them.
pub fn limit_board_list(rows: &[MarketSnapshot], band: &LimitBand) -> Vec<LimitBoardEntry> {
    let mut boards = Vec::new();

    for row in rows.iter().filter(|row| !row.is_halted()) {
        let checks = [
            (LimitDirection::Up, band.classify_up(row)),
            (LimitDirection::Down, band.classify_down(row)),
        ];

        for (direction, status) in checks {
            if status == LimitStatus::Untouched {
                continue;
            }
            boards.push(LimitBoardEntry {
                code: row.code.clone(),
                name: row.name.clone(),
                trade: row.trade,
                direction,
                status,
                turnover_ratio: row.turnover_ratio,
                change_percent: row.change_percent,
            });
        }
    }

    boards.sort_by_key(|entry| (entry.direction, entry.status));
    boards
}

/// Per-classification counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LimitCounts {
    pub up_closed: usize,
    pub up_one_word: usize,
    pub up_touched: usize,
    pub down_closed: usize,
    pub down_one_word: usize,
    pub down_touched: usize,
}

impl LimitCounts {
    pub fn from_boards(boards: &[LimitBoardEntry]) -> Self {
        let mut counts = Self::default();
        for entry in boards {
            let slot = match (entry.direction, entry.status) {
                (LimitDirection::Up, LimitStatus::Closed) => &mut counts.up_closed,
                (LimitDirection::Up, LimitStatus::OneWord) => &mut counts.up_one_word,
                (LimitDirection::Up, LimitStatus::TouchedOpened) => &mut counts.up_touched,
                (LimitDirection::Down, LimitStatus::Closed) => &mut counts.down_closed,
                (LimitDirection::Down, LimitStatus::OneWord) => &mut counts.down_one_word,
                (LimitDirection::Down, LimitStatus::TouchedOpened) => &mut counts.down_touched,
                (_, LimitStatus::Untouched) => continue,
            };
            *slot += 1;
        }
        counts
    }

    /// Closed (incl. one-word) / (closed + touched); 0 when nothing touched
    pub fn up_hold_rate(&self) -> f64 {
        hold_rate(self.up_closed + self.up_one_word, self.up_touched)
    }

    pub fn down_hold_rate(&self) -> f64 {
        hold_rate(self.down_closed + self.down_one_word, self.down_touched)
    }
}

fn hold_rate(closed: usize, touched: usize) -> f64 {
    let total = closed + touched;
    if total == 0 {
        0.0
    } else {
        closed as f64 / total as f64
    }
}

// ============================================================================
// Breadth
// ============================================================================

/// Up/down counts of a set of instruments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Breadth {
    pub total: usize,
    pub up: usize,
    /// Gained more than 3%
    pub up3: usize,
    /// Lost more than 3%
    pub down3: usize,
    /// up / total
    pub up_rate: f64,
}

impl Breadth {
    /// Breadth of `rows`; an empty set is an error.
    pub fn compute<'a>(rows: impl IntoIterator<Item = &'a MarketSnapshot>) -> Result<Self> {
        let (mut total, mut up, mut up3, mut down3) = (0, 0, 0, 0);
        for row in rows {
            total += 1;
            if row.change_percent > 0.0 {
                up += 1;
            }
            if row.change_percent > BIG_MOVE_PERCENT {
                up3 += 1;
            }
            if row.change_percent < -BIG_MOVE_PERCENT {
                down3 += 1;
            }
        }

        if total == 0 {
            return Err(Error::InsufficientData("no instruments in snapshot".into()));
        }

        Ok(Self {
            total,
            up,
            up3,
            down3,
            up_rate: round_to(up as f64 / total as f64, 4),
        })
    }
}

/// The `n` instruments with the highest turnover ratio, highest first.
pub fn top_turnover(rows: &[MarketSnapshot], n: usize) -> Vec<&MarketSnapshot> {
    let mut sorted: Vec<&MarketSnapshot> = rows.iter().collect();
    sorted.sort_by(|a, b| b.turnover_ratio.total_cmp(&a.turnover_ratio));
    sorted.truncate(n);
    sorted
}

// ============================================================================
// Market Day Indicator
// ============================================================================

/// Daily indicator set for the whole market.
#[derive(Debug, Clone)]
pub struct MarketDayIndicator {
    band: LimitBand,
    turnover_top: usize,
}

impl MarketDayIndicator {
    pub fn new(config: &IndicatorConfig) -> Self {
        Self {
            band: LimitBand::from_config(config),
            turnover_top: config.turnover_top,
        }
    }

    pub fn band(&self) -> &LimitBand {
        &self.band
    }

    /// Fetch today's snapshot (halted instruments excluded) and compute.
    pub async fn collect(&self, collector: &dyn Collector) -> Result<IndicatorReport> {
        let rows = collector
            .get_market_snapshot(&SnapshotFilters::default())
            .await?;
        tracing::debug!(
            rows = rows.len(),
            source = collector.name(),
            "Collected market snapshot"
        );
        Ok(self.compute(&rows))
    }

    /// Compute every market indicator; a failed stage is recorded and skipped.
    pub fn compute(&self, rows: &[MarketSnapshot]) -> IndicatorReport {
        let mut report = IndicatorReport::default();

        match Breadth::compute(rows) {
            Ok(b) => {
                let set = &mut report.indicators;
                set.insert("M001", b.up_rate);
                set.insert("M002", b.total);
                set.insert("M003", b.up);
                set.insert("M004", b.up3);
                set.insert("M005", b.down3);
            }
            Err(e) => report.record_failure("total_market", &e),
        }

        match Breadth::compute(top_turnover(rows, self.turnover_top)) {
            Ok(b) => {
                let set = &mut report.indicators;
                set.insert("M006", b.up_rate);
                set.insert("M007", b.up3);
                set.insert("M008", b.down3);
            }
            Err(e) => report.record_failure("turnover_top", &e),
        }

        let counts = LimitCounts::from_boards(&limit_board_list(rows, &self.band));
        let set = &mut report.indicators;
        set.insert("M009", counts.up_closed);
        set.insert("M010", counts.up_one_word);
        set.insert("M011", counts.up_touched);
        set.insert("M012", counts.up_hold_rate());
        set.insert("M013", counts.down_closed);
        set.insert("M014", counts.down_one_word);
        set.insert("M015", counts.down_touched);
        set.insert("M016", counts.down_hold_rate());

        report
    }
}
