//! Market data collection for A-shares.
//!
//! The toolkit consumes four kinds of data, all produced by a [`Collector`]:
//! - Daily/weekly/minute K-lines
//! - Executed-trade ticks for one session
//! - Real-time quote snapshots (single or batched)
//! - Whole-market snapshots for breadth and limit-board statistics
//!
//! Adapters normalize volumes to shares (upstream APIs report lots of 100).

mod eastmoney;
mod provider;

pub use eastmoney::EastmoneyCollector;
pub use provider::Collector;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// K-line period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KlineFreq {
    /// Daily bars
    Daily,
    /// Weekly bars
    Weekly,
    /// Monthly bars
    Monthly,
    /// 5-minute bars
    M5,
    /// 15-minute bars
    M15,
    /// 30-minute bars
    M30,
    /// 60-minute bars
    M60,
}

impl KlineFreq {
    /// Parse from the short codes used on the command line ("D", "W", "M", "5", "15", "30", "60").
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "D" | "DAILY" => Some(Self::Daily),
            "W" | "WEEKLY" => Some(Self::Weekly),
            "M" | "MONTHLY" => Some(Self::Monthly),
            "5" => Some(Self::M5),
            "15" => Some(Self::M15),
            "30" => Some(Self::M30),
            "60" => Some(Self::M60),
            _ => None,
        }
    }
}

impl std::fmt::Display for KlineFreq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "D"),
            Self::Weekly => write!(f, "W"),
            Self::Monthly => write!(f, "M"),
            Self::M5 => write!(f, "5"),
            Self::M15 => write!(f, "15"),
            Self::M30 => write!(f, "30"),
            Self::M60 => write!(f, "60"),
        }
    }
}

/// One OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    /// Bar date (minute bars keep their session date)
    pub date: NaiveDate,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Volume in shares
    pub volume: f64,
}

impl Kline {
    /// Intraday range as a fraction of the open
    pub fn wave_rate(&self) -> f64 {
        (self.high - self.low) / self.open
    }
}

/// Aggressor side of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Buy,
    Sell,
    Neutral,
}

/// One executed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Execution time
    pub datetime: NaiveDateTime,
    /// Trade price
    pub price: f64,
    /// Volume in shares
    pub volume: f64,
    /// Aggressor side
    pub direction: TradeDirection,
}

impl Tick {
    /// Traded notional (price × volume)
    pub fn amount(&self) -> f64 {
        self.price * self.volume
    }
}

/// Real-time quote snapshot for one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Ticker code as requested
    pub code: String,
    /// Instrument name
    pub name: String,
    /// Today's open
    pub open: f64,
    /// Today's high
    pub high: f64,
    /// Today's low
    pub low: f64,
    /// Latest price
    pub price: f64,
    /// Previous close
    pub pre_close: f64,
    /// Traded volume in shares
    pub volume: f64,
    /// Traded amount in CNY
    pub amount: f64,
    /// Level-1 bid price
    pub bid1_price: Option<f64>,
    /// Level-1 bid size in shares
    pub bid1_volume: Option<f64>,
    /// Level-1 ask price
    pub ask1_price: Option<f64>,
    /// Level-1 ask size in shares
    pub ask1_volume: Option<f64>,
    /// Turnover ratio (%)
    pub turnover_ratio: Option<f64>,
    /// Settlement (reference) price for limit bands
    pub settlement: Option<f64>,
}

impl Quote {
    /// Change from previous close
    pub fn change(&self) -> f64 {
        self.price - self.pre_close
    }

    /// Halted instruments have no last price
    pub fn is_halted(&self) -> bool {
        self.price <= 0.0
    }

    /// Whether the quote is up on the day
    pub fn is_up(&self) -> bool {
        !self.is_halted() && self.pre_close > 0.0 && self.change() > 0.0
    }

    /// Whether the quote is down on the day
    pub fn is_down(&self) -> bool {
        !self.is_halted() && self.pre_close > 0.0 && self.change() < 0.0
    }
}

/// Whole-market row for one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Ticker code
    pub code: String,
    /// Instrument name
    pub name: String,
    /// Latest trade price
    pub trade: f64,
    /// Change percent (3.0 means +3%)
    pub change_percent: f64,
    /// Today's open
    pub open: f64,
    /// Today's high
    pub high: f64,
    /// Today's low
    pub low: f64,
    /// Settlement (previous close) price
    pub settlement: f64,
    /// Volume in shares
    pub volume: f64,
    /// Turnover ratio (%)
    pub turnover_ratio: f64,
    /// Traded amount in CNY
    pub amount: f64,
    /// Price-to-book ratio; absent when upstream has none
    #[serde(default)]
    pub pb: Option<f64>,
}

impl MarketSnapshot {
    /// Zero-volume instruments are halted for the session
    pub fn is_halted(&self) -> bool {
        self.volume == 0.0
    }

    /// ST / *ST instruments carry the tag in their name
    pub fn is_st(&self) -> bool {
        self.name.to_uppercase().contains("ST")
    }
}

/// Filters applied to a whole-market snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFilters {
    /// Drop halted (zero-volume) instruments
    pub exclude_halted: bool,
    /// Drop ST instruments
    pub exclude_st: bool,
}

impl Default for SnapshotFilters {
    fn default() -> Self {
        Self {
            exclude_halted: true,
            exclude_st: false,
        }
    }
}

/// Apply snapshot filters, preserving upstream order.
pub fn apply_filters(rows: Vec<MarketSnapshot>, filters: &SnapshotFilters) -> Vec<MarketSnapshot> {
    rows.into_iter()
        .filter(|row| !(filters.exclude_halted && row.is_halted()))
        .filter(|row| !(filters.exclude_st && row.is_st()))
        .collect()
}

/// Strip exchange decorations from a ticker ("sh600000", "600000.SH" -> "600000").
pub fn bare_code(code: &str) -> String {
    let code = code.trim();
    let code = code.split('.').next().unwrap_or(code);
    code.trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .to_string()
}

// ============================================================================
// Tests
// ============================================================================
