//! Daily per-share indicators.
//!
//! Inputs are the daily K-line history, today's ticks and one real-time
//! quote. Each target adds its keys to the set in a fixed order:
//!
//! | Target          | Keys                                                        |
//! |-----------------|-------------------------------------------------------------|
//! | `Basic`         | DATE, CODE, PRICE, NAME, TOTAL_AMOUNT, CHANGE_RATE, WAVE_RATE |
//! | `MovingAverage` | MA{k}_D                                                     |
//! | `LatestNd`      | HIGH_n, LOW_n, CHANGE_n, MAX_DOWN_n, WAVE_RATE_An, WAVE_RATE_Tn |
//! | `TradeSplit`    | BUY_AMOUNT, SELL_AMOUNT, NEUTRAL_AMOUNT                     |
//! | `OrderBook`     | BUY_FIRST, SELL_FIRST                                       |

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tma_common::{Error, IndicatorConfig, Result};

use super::IndicatorReport;
use crate::collector::{Collector, Kline, KlineFreq, Quote, Tick, TradeDirection};

// ============================================================================
// Targets
// ============================================================================

/// Indicator group of a share report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareTarget {
    /// Name, price and today's change/range
    Basic,
    /// Trailing moving averages
    MovingAverage,
    /// Trailing N-day extremes and ranges
    LatestNd,
    /// Buy/sell/neutral traded amounts
    TradeSplit,
    /// Level-1 bid/ask notional
    OrderBook,
}

impl ShareTarget {
    /// Every target, in report order
    pub const ALL: [ShareTarget; 5] = [
        Self::Basic,
        Self::MovingAverage,
        Self::LatestNd,
        Self::TradeSplit,
        Self::OrderBook,
    ];

    /// Parse the short names used on the command line ("ma", "lnd", "bs", "bsf", "basic").
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "ma" => Ok(Self::MovingAverage),
            "lnd" => Ok(Self::LatestNd),
            "bs" => Ok(Self::TradeSplit),
            "bsf" => Ok(Self::OrderBook),
            other => Err(Error::Configuration(format!(
                "Unknown share indicator target '{}': expected basic, ma, lnd, bs or bsf",
                other
            ))),
        }
    }

    fn needs_klines(self) -> bool {
        matches!(self, Self::MovingAverage | Self::LatestNd)
    }

    fn needs_quote(self) -> bool {
        matches!(self, Self::Basic | Self::OrderBook)
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Collector data for one share.
#[derive(Debug, Clone, Default)]
pub struct ShareInputs {
    /// Daily bars, oldest first
    pub klines: Vec<Kline>,
    /// Today's executed trades
    pub ticks: Vec<Tick>,
    /// Real-time quote
    pub quote: Option<Quote>,
}

// ============================================================================
// Calculators
// ============================================================================

/// Arithmetic mean of the last `window` closes, or of all closes when fewer exist.
pub fn moving_average(klines: &[Kline], window: usize) -> Result<f64> {
    if window == 0 {
        return Err(Error::InsufficientData("moving average window is 0".into()));
    }
    if klines.is_empty() {
        return Err(Error::InsufficientData("no daily bars".into()));
    }

    let start = klines.len().saturating_sub(window);
    let recent = &klines[start..];
    Ok(recent.iter().map(|k| k.close).sum::<f64>() / recent.len() as f64)
}

/// Extremes and ranges over the last N bars.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestNd {
    /// Highest high
    pub high: f64,
    /// Lowest low
    pub low: f64,
    /// (last close - first close) / first close
    pub change: f64,
    /// (last close - high) / high
    pub max_down: f64,
    /// Mean of daily (high - low) / open
    pub wave_rate_avg: f64,
    /// (high - low) / first open
    pub wave_rate_total: f64,
}

impl LatestNd {
    /// Compute over the last `n` bars; fewer than `n` bars is an error.
    pub fn compute(klines: &[Kline], n: usize) -> Result<Self> {
        if n == 0 || klines.len() < n {
            return Err(Error::InsufficientData(format!(
                "need {} daily bars, have {}",
                n,
                klines.len()
            )));
        }

        let window = &klines[klines.len() - n..];
        let first = &window[0];
        let last = &window[n - 1];

        if first.open <= 0.0 || first.close <= 0.0 || window.iter().any(|k| k.open <= 0.0) {
            return Err(Error::InsufficientData(format!(
                "non-positive price in last {} bars",
                n
            )));
        }

        let high = window.iter().map(|k| k.high).fold(f64::MIN, f64::max);
        let low = window.iter().map(|k| k.low).fold(f64::MAX, f64::min);

        Ok(Self {
            high,
            low,
            change: (last.close - first.close) / first.close,
            max_down: (last.close - high) / high,
            wave_rate_avg: window.iter().map(Kline::wave_rate).sum::<f64>() / n as f64,
            wave_rate_total: (high - low) / first.open,
        })
    }
}

/// Traded amount per aggressor side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TradeSplit {
    pub buy: f64,
    pub sell: f64,
    pub neutral: f64,
}

impl TradeSplit {
    /// Sum price × volume by direction
    pub fn from_ticks(ticks: &[Tick]) -> Self {
        ticks.iter().fold(Self::default(), |mut acc, tick| {
            match tick.direction {
                TradeDirection::Buy => acc.buy += tick.amount(),
                TradeDirection::Sell => acc.sell += tick.amount(),
                TradeDirection::Neutral => acc.neutral += tick.amount(),
            }
            acc
        })
    }
}

/// Level-1 (bid, ask) notional; a missing or zero size counts as 0.
pub fn order_book_amounts(quote: &Quote) -> (f64, f64) {
    fn notional(price: Option<f64>, volume: Option<f64>) -> f64 {
        match (price, volume) {
            (Some(p), Some(v)) if v > 0.0 => p * v,
            _ => 0.0,
        }
    }

    (
        notional(quote.bid1_price, quote.bid1_volume),
        notional(quote.ask1_price, quote.ask1_volume),
    )
}

// ============================================================================
// Share Day Indicator
// ============================================================================

/// Daily indicator set for one share.
#[derive(Debug, Clone)]
pub struct ShareDayIndicator {
    code: String,
    ma_windows: Vec<usize>,
    nd_windows: Vec<usize>,
}

impl ShareDayIndicator {
    pub fn new(code: impl Into<String>, config: &IndicatorConfig) -> Self {
        Self {
            code: code.into(),
            ma_windows: config.ma_windows.clone(),
            nd_windows: config.nd_windows.clone(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Fetch what `targets` need from the collector and compute.
    ///
    /// Collector failures propagate; calculation failures are recorded in
    /// the report.
    pub async fn collect(
        &self,
        collector: &dyn Collector,
        targets: &[ShareTarget],
    ) -> Result<IndicatorReport> {
        let mut inputs = ShareInputs::default();

        if targets.iter().any(|t| t.needs_klines()) {
            inputs.klines = collector
                .get_klines(&self.code, KlineFreq::Daily, None)
                .await?;
        }
        if targets.contains(&ShareTarget::TradeSplit) {
            inputs.ticks = collector.get_ticks(&self.code, None).await?;
        }
        if targets.iter().any(|t| t.needs_quote()) {
            inputs.quote = Some(collector.get_quote(&self.code).await?);
        }

        tracing::debug!(
            code = %self.code,
            klines = inputs.klines.len(),
            ticks = inputs.ticks.len(),
            "Collected share inputs"
        );

        Ok(self.compute(&inputs, targets, Local::now().date_naive()))
    }

    /// Compute `targets` from already collected data.
    pub fn compute(
        &self,
        inputs: &ShareInputs,
        targets: &[ShareTarget],
        date: NaiveDate,
    ) -> IndicatorReport {
        let mut report = IndicatorReport::default();

        for target in ShareTarget::ALL.iter().filter(|t| targets.contains(t)) {
            match target {
                ShareTarget::Basic => self.basic_info(inputs, date, &mut report),
                ShareTarget::MovingAverage => self.moving_averages(inputs, &mut report),
                ShareTarget::LatestNd => self.latest_nd(inputs, &mut report),
                ShareTarget::TradeSplit => {
                    let split = TradeSplit::from_ticks(&inputs.ticks);
                    report.indicators.insert("BUY_AMOUNT", split.buy);
                    report.indicators.insert("SELL_AMOUNT", split.sell);
                    report.indicators.insert("NEUTRAL_AMOUNT", split.neutral);
                }
                ShareTarget::OrderBook => match &inputs.quote {
                    Some(quote) => {
                        let (buy_first, sell_first) = order_book_amounts(quote);
                        report.indicators.insert("BUY_FIRST", buy_first);
                        report.indicators.insert("SELL_FIRST", sell_first);
                    }
                    None => report.record_failure("order_book", &missing_quote()),
                },
            }
        }

        report
    }

    fn basic_info(&self, inputs: &ShareInputs, date: NaiveDate, report: &mut IndicatorReport) {
        report
            .indicators
            .insert("DATE", date.format("%Y-%m-%d").to_string());
        report.indicators.insert("CODE", self.code.as_str());

        let Some(quote) = &inputs.quote else {
            report.record_failure("basic", &missing_quote());
            return;
        };

        let set = &mut report.indicators;
        set.insert("PRICE", quote.price);
        set.insert("NAME", quote.name.as_str());
        set.insert("TOTAL_AMOUNT", quote.amount);

        if quote.open > 0.0 {
            set.insert("CHANGE_RATE", (quote.price - quote.open) / quote.open);
            set.insert("WAVE_RATE", (quote.high - quote.low) / quote.open);
        } else {
            report.record_failure(
                "basic",
                &Error::InsufficientData(format!("{} has no open price yet", self.code)),
            );
        }
    }

    fn moving_averages(&self, inputs: &ShareInputs, report: &mut IndicatorReport) {
        for &window in &self.ma_windows {
            match moving_average(&inputs.klines, window) {
                Ok(ma) => report.indicators.insert(format!("MA{}_D", window), ma),
                Err(e) => report.record_failure(format!("MA{}_D", window), &e),
            }
        }
    }

    fn latest_nd(&self, inputs: &ShareInputs, report: &mut IndicatorReport) {
        for &n in &self.nd_windows {
            match LatestNd::compute(&inputs.klines, n) {
                Ok(nd) => {
                    let set = &mut report.indicators;
                    set.insert(format!("HIGH_{}", n), nd.high);
                    set.insert(format!("LOW_{}", n), nd.low);
                    set.insert(format!("CHANGE_{}", n), nd.change);
                    set.insert(format!("MAX_DOWN_{}", n), nd.max_down);
                    set.insert(format!("WAVE_RATE_A{}", n), nd.wave_rate_avg);
                    set.insert(format!("WAVE_RATE_T{}", n), nd.wave_rate_total);
                }
                Err(e) => report.record_failure(format!("LND_{}", n), &e),
            }
        }
    }
}

fn missing_quote() -> Error {
    Error::InsufficientData("no real-time quote".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn bars(closes: &[f64]) -> Vec<Kline> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Kline {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    fn tick(price: f64, volume: f64, direction: TradeDirection) -> Tick {
        Tick {
            datetime: NaiveDateTime::parse_from_str("2024-01-02 09:30:00", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
            price,
            volume,
            direction,
        }
    }

    #[test]
    fn test_moving_average_partial_window() {
        let klines = bars(&[10.0, 11.0, 12.0]);
        assert_eq!(moving_average(&klines, 2).unwrap(), 11.5);
        assert_eq!(moving_average(&klines, 240).unwrap(), 11.0);
        assert!(moving_average(&[], 5).is_err());
    }

    #[test]
    fn test_latest_nd() {
        let klines = bars(&[10.0, 12.0, 11.0, 13.0, 12.0]);
        let nd = LatestNd::compute(&klines, 4).unwrap();

        assert_eq!(nd.high, 14.0);
        assert_eq!(nd.low, 10.0);
        assert_eq!(nd.change, 0.0);
        assert!((nd.max_down - (12.0 - 14.0) / 14.0).abs() < 1e-12);
        assert!((nd.wave_rate_total - 4.0 / 11.5).abs() < 1e-12);

        assert!(matches!(
            LatestNd::compute(&klines, 6),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn test_trade_split() {
        let ticks = vec![
            tick(10.0, 100.0, TradeDirection::Buy),
            tick(10.0, 50.0, TradeDirection::Sell),
            tick(10.0, 20.0, TradeDirection::Neutral),
            tick(11.0, 100.0, TradeDirection::Buy),
        ];
        let split = TradeSplit::from_ticks(&ticks);
        assert_eq!(split.buy, 2100.0);
        assert_eq!(split.sell, 500.0);
        assert_eq!(split.neutral, 200.0);
    }

    #[test]
    fn test_order_book_amounts() {
        let quote = Quote {
            bid1_price: Some(11.0),
            bid1_volume: Some(1000.0),
            ask1_price: Some(0.0),
            ask1_volume: Some(0.0),
            ..Default::default()
        };
        assert_eq!(order_book_amounts(&quote), (11_000.0, 0.0));
        assert_eq!(order_book_amounts(&Quote::default()), (0.0, 0.0));
    }

    #[test]
    fn test_compute_skips_short_windows() {
        let config = IndicatorConfig::default();
        let indicator = ShareDayIndicator::new("600682", &config);
        let inputs = ShareInputs {
            klines: bars(&(0..30).map(|i| 10.0 + i as f64 * 0.1).collect::<Vec<_>>()),
            ..Default::default()
        };

        let report = indicator.compute(
            &inputs,
            &[ShareTarget::MovingAverage, ShareTarget::LatestNd],
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        );

        // all MA windows succeed on partial data
        assert!(report.indicators.get_f64("MA240_D").is_some());
        assert!(report.indicators.get_f64("HIGH_20").is_some());
        assert!(report.indicators.get_f64("HIGH_40").is_none());

        let scopes: Vec<&str> = report.failures.iter().map(|f| f.scope.as_str()).collect();
        assert_eq!(scopes, vec!["LND_40", "LND_60"]);
    }

    #[test]
    fn test_basic_info_keys_in_order() {
        let config = IndicatorConfig::default();
        let indicator = ShareDayIndicator::new("600682", &config);
        let inputs = ShareInputs {
            quote: Some(Quote {
                code: "600682".into(),
                name: "南京新百".into(),
                open: 10.0,
                high: 11.0,
                low: 9.5,
                price: 10.5,
                amount: 1.2e8,
                ..Default::default()
            }),
            ..Default::default()
        };

        let report = indicator.compute(
            &inputs,
            &[ShareTarget::OrderBook, ShareTarget::Basic],
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        );

        let keys: Vec<&str> = report.indicators.keys().collect();
        assert_eq!(
            keys,
            vec![
                "DATE", "CODE", "PRICE", "NAME", "TOTAL_AMOUNT", "CHANGE_RATE", "WAVE_RATE",
                "BUY_FIRST", "SELL_FIRST"
            ]
        );
        assert_eq!(report.indicators.get_f64("CHANGE_RATE"), Some(0.05));
        assert_eq!(report.indicators.get_f64("WAVE_RATE"), Some(0.15));
        assert!(report.is_complete());
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(ShareTarget::parse("MA").unwrap(), ShareTarget::MovingAverage);
        assert_eq!(ShareTarget::parse("bsf").unwrap(), ShareTarget::OrderBook);
        assert!(ShareTarget::parse("xyz").unwrap_err().is_configuration());
    }
}
