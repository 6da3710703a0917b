//! Indicator aggregation for single shares and the whole market.
//!
//! Calculators are pure functions of collector data. Each produces an
//! [`IndicatorReport`]: an ordered [`IndicatorSet`] plus the list of
//! windows or stages that could not be computed. One failed window never
//! discards the others.
//!
//! Key namespaces:
//! - `M001`..`M016` - market-wide breadth and limit-board statistics
//! - `MA{k}_D`, `HIGH_{n}`, `BUY_AMOUNT`, ... - per-share indicators

pub mod market;
pub mod meta;
pub mod share;

pub use market::{
    limit_board_list, Breadth, LimitBand, LimitBoardEntry, LimitCounts, LimitDirection,
    LimitStatus, MarketDayIndicator,
};
pub use meta::{check_indicator_meta, IndicatorMeta};
pub use share::{LatestNd, ShareDayIndicator, ShareInputs, ShareTarget, TradeSplit};

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tma_common::util::round_to;
use tma_common::Error;

/// Decimal places kept for every numeric indicator
pub const INDICATOR_PRECISION: u32 = 4;

// ============================================================================
// Values
// ============================================================================

/// A single indicator value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndicatorValue {
    Number(f64),
    Text(String),
}

impl IndicatorValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl From<f64> for IndicatorValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<usize> for IndicatorValue {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<String> for IndicatorValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for IndicatorValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl std::fmt::Display for IndicatorValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

// ============================================================================
// Indicator Set
// ============================================================================

/// Indicator key/value pairs in insertion order.
///
/// Numeric values are rounded to [`INDICATOR_PRECISION`] places on insert.
/// Re-inserting a key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSet {
    entries: Vec<(String, IndicatorValue)>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<IndicatorValue>) {
        let key = key.into();
        let value = match value.into() {
            IndicatorValue::Number(n) => IndicatorValue::Number(round_to(n, INDICATOR_PRECISION)),
            text => text,
        };

        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&IndicatorValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Numeric value of a key
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(IndicatorValue::as_f64)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndicatorValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert every entry of `other`, in its order
    pub fn extend(&mut self, other: IndicatorSet) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }

    /// Plain-text table: key, value and the registry explanation if any
    pub fn render_table(&self) -> String {
        let width = self.keys().map(str::len).max().unwrap_or(0);
        let mut out = String::new();

        for (key, value) in self.iter() {
            let explain = check_indicator_meta(key)
                .map(|meta| meta.explain)
                .unwrap_or_default();
            out.push_str(&format!(
                "{:<width$}  {:<16}  {}\n",
                key,
                value.to_string(),
                explain,
                width = width
            ));
        }

        out
    }
}

impl Serialize for IndicatorSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ============================================================================
// Reports
// ============================================================================

/// A window, stage or instrument that could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorFailure {
    /// What was skipped ("LND_60", "basic", "600000")
    pub scope: String,
    /// Error message
    pub error: String,
}

/// Indicator results with the failures collected along the way.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorReport {
    pub indicators: IndicatorSet,
    pub failures: Vec<IndicatorFailure>,
}

impl IndicatorReport {
    /// Record a skipped scope and log it
    pub fn record_failure(&mut self, scope: impl Into<String>, error: &Error) {
        let scope = scope.into();
        tracing::warn!(scope = %scope, error = %error, "Indicator skipped");
        self.failures.push(IndicatorFailure {
            scope,
            error: error.to_string(),
        });
    }

    /// Whether every requested indicator was computed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Merge another report, keeping order
    pub fn merge(&mut self, other: IndicatorReport) {
        self.indicators.extend(other.indicators);
        self.failures.extend(other.failures);
    }
}
