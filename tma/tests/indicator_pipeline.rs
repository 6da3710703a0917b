//! Integration tests for share and market indicator collection.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use tma::collector::{
    Collector, Kline, KlineFreq, MarketSnapshot, Quote, SnapshotFilters, Tick, TradeDirection,
};
use tma::indicator::{MarketDayIndicator, ShareDayIndicator, ShareTarget};
use tma::monitor::market_status;
use tma_common::{CollectorError, IndicatorConfig};

/// Canned market data.
#[derive(Default)]
struct FixtureCollector {
    klines: Vec<Kline>,
    ticks: Vec<Tick>,
    quote: Option<Quote>,
    snapshot: Vec<MarketSnapshot>,
}

#[async_trait]
impl Collector for FixtureCollector {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn get_klines(
        &self,
        _code: &str,
        _freq: KlineFreq,
        _start_date: Option<NaiveDate>,
    ) -> Result<Vec<Kline>, CollectorError> {
        Ok(self.klines.clone())
    }

    async fn get_ticks(
        &self,
        _code: &str,
        _date: Option<NaiveDate>,
    ) -> Result<Vec<Tick>, CollectorError> {
        Ok(self.ticks.clone())
    }

    async fn get_quotes(&self, _codes: &[String]) -> Result<Vec<Quote>, CollectorError> {
        Ok(self.quote.clone().into_iter().collect())
    }

    async fn get_market_snapshot(
        &self,
        _filters: &SnapshotFilters,
    ) -> Result<Vec<MarketSnapshot>, CollectorError> {
        Ok(self.snapshot.clone())
    }
}

fn daily_bars(closes: &[f64]) -> Vec<Kline> {
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Kline {
            date: start + Duration::days(i as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10_000.0,
        })
        .collect()
}

fn tick(price: f64, volume: f64, direction: TradeDirection) -> Tick {
    Tick {
        datetime: NaiveDateTime::parse_from_str("2024-03-08 10:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap(),
        price,
        volume,
        direction,
    }
}

fn snapshot(code: &str, settlement: f64, high: f64, low: f64, trade: f64) -> MarketSnapshot {
    MarketSnapshot {
        code: code.to_string(),
        name: format!("N{}", code),
        trade,
        change_percent: (trade - settlement) / settlement * 100.0,
        open: settlement,
        high,
        low,
        settlement,
        volume: 1_000_000.0,
        turnover_ratio: 2.0,
        amount: trade * 1_000_000.0,
        pb: None,
    }
}

fn config(ma: Vec<usize>, nd: Vec<usize>) -> IndicatorConfig {
    IndicatorConfig {
        ma_windows: ma,
        nd_windows: nd,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_share_collect_all_targets() {
    let collector = FixtureCollector {
        klines: daily_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]),
        ticks: vec![
            tick(10.0, 200.0, TradeDirection::Buy),
            tick(10.0, 100.0, TradeDirection::Sell),
            tick(10.0, 50.0, TradeDirection::Neutral),
        ],
        quote: Some(Quote {
            code: "600000".into(),
            name: "浦发银行".into(),
            open: 10.0,
            high: 10.6,
            low: 9.8,
            price: 10.4,
            pre_close: 10.0,
            amount: 5.0e8,
            bid1_price: Some(10.39),
            bid1_volume: Some(1000.0),
            ask1_price: Some(10.4),
            ask1_volume: Some(2000.0),
            ..Default::default()
        }),
        ..Default::default()
    };

    let indicator = ShareDayIndicator::new("600000", &config(vec![2, 5], vec![5]));
    let report = indicator
        .collect(&collector, &ShareTarget::ALL)
        .await
        .unwrap();

    assert!(report.is_complete(), "failures: {:?}", report.failures);
    let set = &report.indicators;
    assert_eq!(set.get("CODE").unwrap().to_string(), "600000");
    assert_eq!(set.get("NAME").unwrap().to_string(), "浦发银行");
    assert_eq!(set.get_f64("CHANGE_RATE"), Some(0.04));
    assert_eq!(set.get_f64("WAVE_RATE"), Some(0.08));
    assert_eq!(set.get_f64("MA2_D"), Some(13.5));
    assert_eq!(set.get_f64("MA5_D"), Some(12.0));
    assert_eq!(set.get_f64("HIGH_5"), Some(15.0));
    assert_eq!(set.get_f64("LOW_5"), Some(9.0));
    assert_eq!(set.get_f64("CHANGE_5"), Some(0.4));
    assert_eq!(set.get_f64("BUY_AMOUNT"), Some(2000.0));
    assert_eq!(set.get_f64("SELL_AMOUNT"), Some(1000.0));
    assert_eq!(set.get_f64("NEUTRAL_AMOUNT"), Some(500.0));
    assert_eq!(set.get_f64("BUY_FIRST"), Some(10390.0));
    assert_eq!(set.get_f64("SELL_FIRST"), Some(20800.0));

    let keys: Vec<&str> = set.keys().collect();
    let pos = |k: &str| keys.iter().position(|x| *x == k).unwrap();
    assert!(pos("DATE") < pos("MA2_D"));
    assert!(pos("MA5_D") < pos("HIGH_5"));
    assert!(pos("HIGH_5") < pos("BUY_AMOUNT"));
}

#[tokio::test]
async fn test_short_history_skips_long_windows() {
    let collector = FixtureCollector {
        klines: daily_bars(&[10.0, 12.0, 14.0]),
        ..Default::default()
    };

    let indicator = ShareDayIndicator::new("000001", &config(vec![5], vec![2, 10]));
    let report = indicator
        .collect(&collector, &[ShareTarget::MovingAverage, ShareTarget::LatestNd])
        .await
        .unwrap();

    // MA over a partial window averages what exists
    assert_eq!(report.indicators.get_f64("MA5_D"), Some(12.0));
    assert_eq!(report.indicators.get_f64("HIGH_2"), Some(15.0));
    assert!(report.indicators.get("HIGH_10").is_none());

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].scope, "LND_10");
}

#[tokio::test]
async fn test_share_report_serializes_in_order() {
    let collector = FixtureCollector {
        klines: daily_bars(&[10.0, 10.0]),
        ..Default::default()
    };

    let indicator = ShareDayIndicator::new("600519", &config(vec![2], vec![]));
    let report = indicator
        .collect(&collector, &[ShareTarget::MovingAverage])
        .await
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["indicators"]["MA2_D"], 10.0);
    assert!(json["failures"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_market_collect() {
    let collector = FixtureCollector {
        snapshot: vec![
            // One-word limit up
            snapshot("600000", 10.0, 11.0, 11.0, 11.0),
            // Closed limit up with intraday movement
            snapshot("600001", 10.0, 11.0, 10.2, 11.0),
            // Touched limit up then opened
            snapshot("600002", 10.0, 11.0, 10.1, 10.5),
            // Closed limit down
            snapshot("600003", 10.0, 9.8, 9.0, 9.0),
            // Flat
            snapshot("600004", 10.0, 10.1, 9.9, 10.0),
        ],
        ..Default::default()
    };

    let report = MarketDayIndicator::new(&IndicatorConfig::default())
        .collect(&collector)
        .await
        .unwrap();

    assert!(report.is_complete());
    let set = &report.indicators;
    assert_eq!(set.get_f64("M002"), Some(5.0));
    assert_eq!(set.get_f64("M003"), Some(3.0));
    assert_eq!(set.get_f64("M001"), Some(0.6));
    assert_eq!(set.get_f64("M004"), Some(3.0));
    assert_eq!(set.get_f64("M005"), Some(1.0));
    assert_eq!(set.get_f64("M009"), Some(1.0));
    assert_eq!(set.get_f64("M010"), Some(1.0));
    assert_eq!(set.get_f64("M011"), Some(1.0));
    assert_eq!(set.get_f64("M012"), Some(0.6667));
    assert_eq!(set.get_f64("M013"), Some(1.0));
    assert_eq!(set.get_f64("M016"), Some(1.0));

    let keys: Vec<&str> = set.keys().collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[tokio::test]
async fn test_market_collect_empty_snapshot() {
    let report = MarketDayIndicator::new(&IndicatorConfig::default())
        .collect(&FixtureCollector::default())
        .await
        .unwrap();

    assert!(report.indicators.get("M001").is_none());
    assert_eq!(report.indicators.get_f64("M009"), Some(0.0));
    assert_eq!(report.indicators.get_f64("M012"), Some(0.0));
    assert_eq!(report.failures.len(), 2);
}

#[tokio::test]
async fn test_market_status_report() {
    let collector = FixtureCollector {
        snapshot: vec![
            snapshot("600000", 10.0, 11.0, 11.0, 11.0),
            snapshot("600004", 10.0, 10.1, 9.9, 10.0),
        ],
        ..Default::default()
    };

    let (markdown, report) = market_status(&collector, &IndicatorConfig::default())
        .await
        .unwrap();

    assert!(markdown.contains("今日开盘个股总数为2家"));
    assert!(markdown.contains("其中一字板1家"));
    assert!(markdown.contains("| 600000 |"));
    assert!(markdown.contains("一字涨停"));
    assert_eq!(report.indicators.get_f64("M010"), Some(1.0));
}
