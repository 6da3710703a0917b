//! Eastmoney adapter for A-share market data.
//!
//! Uses the public eastmoney push APIs (no key, no published rate limit).
//!
//! # Data Sources
//! - K-lines: push2his.eastmoney.com `stock/kline/get`
//! - Ticks: push2.eastmoney.com `stock/details/get` (today only)
//! - Quotes: push2.eastmoney.com `ulist.np/get` (batched) and `stock/get` (order book)
//! - Market snapshot: push2.eastmoney.com `clist/get`

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tma_common::config::CollectorConfig;
use tma_common::CollectorError;
use tracing::{debug, warn};

use super::provider::Collector;
use super::{
    apply_filters, bare_code, Kline, KlineFreq, MarketSnapshot, Quote, SnapshotFilters, Tick,
    TradeDirection,
};

// ============================================================================
// Constants
// ============================================================================

/// Eastmoney real-time API
const EASTMONEY_PUSH_URL: &str = "https://push2.eastmoney.com";

/// Eastmoney historical data API
const EASTMONEY_HIS_URL: &str = "https://push2his.eastmoney.com";

/// Shares per lot; eastmoney reports volumes in lots
const LOT_SIZE: f64 = 100.0;

/// Market filter for SH/SZ main board, ChiNext and STAR
const A_SHARE_MARKETS: &str = "m:0+t:6,m:0+t:80,m:1+t:2,m:1+t:23";

// ============================================================================
// Symbol Mapping
// ============================================================================

/// Convert a ticker to eastmoney's secid ("600000" -> "1.600000", "000001.SZ" -> "0.000001").
fn to_secid(code: &str) -> Option<String> {
    let trimmed = code.trim();
    let lower = trimmed.to_lowercase();

    let explicit = if lower.starts_with("sh") || lower.ends_with(".sh") {
        Some("1")
    } else if lower.starts_with("sz") || lower.ends_with(".sz") || lower.ends_with(".bj") {
        Some("0")
    } else {
        None
    };

    let bare = bare_code(trimmed);
    if bare.len() != 6 || !bare.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let market = explicit.unwrap_or_else(|| match bare.as_bytes()[0] {
        b'5' | b'6' | b'9' => "1",
        _ => "0",
    });

    Some(format!("{}.{}", market, bare))
}

/// Convert K-line frequency to eastmoney klt parameter
fn freq_to_klt(freq: KlineFreq) -> i32 {
    match freq {
        KlineFreq::M5 => 5,
        KlineFreq::M15 => 15,
        KlineFreq::M30 => 30,
        KlineFreq::M60 => 60,
        KlineFreq::Daily => 101,
        KlineFreq::Weekly => 102,
        KlineFreq::Monthly => 103,
    }
}

// ============================================================================
// Eastmoney Collector
// ============================================================================

/// Collector backed by eastmoney's public APIs.
pub struct EastmoneyCollector {
    /// HTTP client
    client: reqwest::Client,
    /// Real-time API base URL
    push_url: String,
    /// Historical API base URL
    his_url: String,
}

impl EastmoneyCollector {
    /// Create a collector with default settings
    pub fn new() -> Self {
        Self::from_config(&CollectorConfig::default())
    }

    /// Create from config
    pub fn from_config(config: &CollectorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            push_url: EASTMONEY_PUSH_URL.to_string(),
            his_url: EASTMONEY_HIS_URL.to_string(),
        }
    }

    /// Point both APIs at another host (used for tests and mirrors)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.push_url = base_url.clone();
        self.his_url = base_url;
        self
    }

    /// Issue a GET and decode the eastmoney envelope
    async fn fetch<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, CollectorError> {
        debug!(url = %url, "Fetching from eastmoney");

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| CollectorError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(CollectorError::Network(format!("HTTP {}", status)));
        }

        let envelope: EastmoneyResponse<T> = response
            .json()
            .await
            .map_err(|e| CollectorError::Upstream(format!("Failed to parse response: {}", e)))?;

        if envelope.rc != 0 {
            return Err(CollectorError::Upstream(format!(
                "Eastmoney API error: rc={}",
                envelope.rc
            )));
        }

        Ok(envelope.data)
    }

    /// Parse eastmoney kline strings into Klines
    fn parse_klines(lines: &[String]) -> Result<Vec<Kline>, CollectorError> {
        let mut klines = Vec::with_capacity(lines.len());

        for line in lines {
            // Format: "2024-01-02,10.50,10.70,10.80,10.40,1000,..."
            // Fields: date,open,close,high,low,volume,amount,...
            let parts: Vec<&str> = line.split(',').collect();
            if parts.len() < 6 {
                warn!(line = %line, "Invalid kline format, skipping");
                continue;
            }

            let date_part = parts[0].split(' ').next().unwrap_or(parts[0]);
            let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
                .map_err(|e| CollectorError::Upstream(format!("Failed to parse date: {}", e)))?;

            klines.push(Kline {
                date,
                open: parse_field(parts[1], "open")?,
                close: parse_field(parts[2], "close")?,
                high: parse_field(parts[3], "high")?,
                low: parse_field(parts[4], "low")?,
                volume: parse_field(parts[5], "volume")? * LOT_SIZE,
            });
        }

        klines.sort_by_key(|k| k.date);

        Ok(klines)
    }

    /// Parse eastmoney tick detail strings ("09:25:00,10.50,120,0,2")
    fn parse_ticks(date: NaiveDate, lines: &[String]) -> Result<Vec<Tick>, CollectorError> {
        let mut ticks = Vec::with_capacity(lines.len());

        for line in lines {
            let parts: Vec<&str> = line.split(',').collect();
            if parts.len() < 3 {
                warn!(line = %line, "Invalid tick format, skipping");
                continue;
            }

            let time = NaiveTime::parse_from_str(parts[0], "%H:%M:%S")
                .map_err(|e| CollectorError::Upstream(format!("Failed to parse time: {}", e)))?;

            // f55: 1 = sell, 2 = buy, 4 = neutral
            let direction = match parts.get(4).copied() {
                Some("2") => TradeDirection::Buy,
                Some("1") => TradeDirection::Sell,
                _ => TradeDirection::Neutral,
            };

            ticks.push(Tick {
                datetime: NaiveDateTime::new(date, time),
                price: parse_field(parts[1], "price")?,
                volume: parse_field(parts[2], "volume")? * LOT_SIZE,
                direction,
            });
        }

        ticks.sort_by_key(|t| t.datetime);

        Ok(ticks)
    }

    fn row_to_quote(row: &Map<String, Value>) -> Quote {
        Quote {
            code: text(row, "f12"),
            name: text(row, "f14"),
            open: num(row, "f17").unwrap_or(0.0),
            high: num(row, "f15").unwrap_or(0.0),
            low: num(row, "f16").unwrap_or(0.0),
            price: num(row, "f2").unwrap_or(0.0),
            pre_close: num(row, "f18").unwrap_or(0.0),
            volume: num(row, "f5").unwrap_or(0.0) * LOT_SIZE,
            amount: num(row, "f6").unwrap_or(0.0),
            bid1_price: None,
            bid1_volume: None,
            ask1_price: None,
            ask1_volume: None,
            turnover_ratio: num(row, "f8"),
            settlement: num(row, "f18"),
        }
    }

    fn row_to_snapshot(row: &Map<String, Value>) -> MarketSnapshot {
        MarketSnapshot {
            code: text(row, "f12"),
            name: text(row, "f14"),
            trade: num(row, "f2").unwrap_or(0.0),
            change_percent: num(row, "f3").unwrap_or(0.0),
            open: num(row, "f17").unwrap_or(0.0),
            high: num(row, "f15").unwrap_or(0.0),
            low: num(row, "f16").unwrap_or(0.0),
            settlement: num(row, "f18").unwrap_or(0.0),
            volume: num(row, "f5").unwrap_or(0.0) * LOT_SIZE,
            turnover_ratio: num(row, "f8").unwrap_or(0.0),
            amount: num(row, "f6").unwrap_or(0.0),
            pb: num(row, "f23"),
        }
    }
}

impl Default for EastmoneyCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_field(raw: &str, field: &str) -> Result<f64, CollectorError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| CollectorError::Upstream(format!("Failed to parse {}: {}", field, e)))
}

/// Numeric field; halted instruments report "-" instead of a number
fn num(row: &Map<String, Value>, key: &str) -> Option<f64> {
    match row.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn text(row: &Map<String, Value>, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn require_secid(code: &str) -> Result<String, CollectorError> {
    to_secid(code)
        .ok_or_else(|| CollectorError::InvalidRequest(format!("Invalid symbol format: {}", code)))
}

// ============================================================================
// Collector Implementation
// ============================================================================

#[async_trait]
impl Collector for EastmoneyCollector {
    fn name(&self) -> &'static str {
        "eastmoney"
    }

    async fn get_klines(
        &self,
        code: &str,
        freq: KlineFreq,
        start_date: Option<NaiveDate>,
    ) -> Result<Vec<Kline>, CollectorError> {
        let secid = require_secid(code)?;
        let url = format!("{}/api/qt/stock/kline/get", self.his_url);

        let query = [
            ("secid", secid),
            ("klt", freq_to_klt(freq).to_string()),
            // forward-adjusted prices
            ("fqt", "1".to_string()),
            (
                "beg",
                start_date
                    .map(|d| d.format("%Y%m%d").to_string())
                    .unwrap_or_else(|| "0".to_string()),
            ),
            ("end", "20500101".to_string()),
            ("fields1", "f1,f2,f3,f4,f5,f6".to_string()),
            ("fields2", "f51,f52,f53,f54,f55,f56,f57".to_string()),
        ];

        let data: Option<KlineData> = self.fetch(&url, &query).await?;
        let lines = data.and_then(|d| d.klines).unwrap_or_default();

        Self::parse_klines(&lines)
    }

    async fn get_ticks(
        &self,
        code: &str,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Tick>, CollectorError> {
        let today = Local::now().date_naive();
        let date = date.unwrap_or(today);
        if date != today {
            return Err(CollectorError::InvalidRequest(format!(
                "Eastmoney only serves ticks for the current session, not {}",
                date
            )));
        }

        let secid = require_secid(code)?;
        let url = format!("{}/api/qt/stock/details/get", self.push_url);
        let query = [
            ("secid", secid),
            ("pos", "-0".to_string()),
            ("fields1", "f1,f2,f3,f4".to_string()),
            ("fields2", "f51,f52,f53,f54,f55".to_string()),
        ];

        let data: Option<TickData> = self.fetch(&url, &query).await?;
        let lines = data.and_then(|d| d.details).unwrap_or_default();

        Self::parse_ticks(date, &lines)
    }

    async fn get_quotes(&self, codes: &[String]) -> Result<Vec<Quote>, CollectorError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let secids = codes
            .iter()
            .map(|c| require_secid(c))
            .collect::<Result<Vec<_>, _>>()?
            .join(",");

        let url = format!("{}/api/qt/ulist.np/get", self.push_url);
        let query = [
            ("fltt", "2".to_string()),
            ("invt", "2".to_string()),
            ("secids", secids),
            ("fields", "f2,f5,f6,f8,f12,f14,f15,f16,f17,f18".to_string()),
        ];

        let data: Option<ListData> = self.fetch(&url, &query).await?;
        let rows = data.and_then(|d| d.diff).unwrap_or_default();

        Ok(rows.iter().map(Self::row_to_quote).collect())
    }

    async fn get_quote(&self, code: &str) -> Result<Quote, CollectorError> {
        let secid = require_secid(code)?;
        let url = format!("{}/api/qt/stock/get", self.push_url);
        let query = [
            ("secid", secid),
            ("fltt", "2".to_string()),
            ("invt", "2".to_string()),
            (
                "fields",
                "f19,f20,f39,f40,f43,f44,f45,f46,f47,f48,f57,f58,f60,f168".to_string(),
            ),
        ];

        let row: Map<String, Value> = self
            .fetch(&url, &query)
            .await?
            .ok_or_else(|| CollectorError::DataNotAvailable(format!("No quote for {}", code)))?;

        Ok(Quote {
            code: text(&row, "f57"),
            name: text(&row, "f58"),
            open: num(&row, "f46").unwrap_or(0.0),
            high: num(&row, "f44").unwrap_or(0.0),
            low: num(&row, "f45").unwrap_or(0.0),
            price: num(&row, "f43").unwrap_or(0.0),
            pre_close: num(&row, "f60").unwrap_or(0.0),
            volume: num(&row, "f47").unwrap_or(0.0) * LOT_SIZE,
            amount: num(&row, "f48").unwrap_or(0.0),
            bid1_price: num(&row, "f19"),
            bid1_volume: num(&row, "f20").map(|v| v * LOT_SIZE),
            ask1_price: num(&row, "f39"),
            ask1_volume: num(&row, "f40").map(|v| v * LOT_SIZE),
            turnover_ratio: num(&row, "f168"),
            settlement: num(&row, "f60"),
        })
    }

    async fn get_market_snapshot(
        &self,
        filters: &SnapshotFilters,
    ) -> Result<Vec<MarketSnapshot>, CollectorError> {
        let url = format!("{}/api/qt/clist/get", self.push_url);
        let query = [
            ("pn", "1".to_string()),
            ("pz", "10000".to_string()),
            ("po", "1".to_string()),
            ("np", "1".to_string()),
            ("fltt", "2".to_string()),
            ("invt", "2".to_string()),
            ("fid", "f12".to_string()),
            ("fs", A_SHARE_MARKETS.to_string()),
            ("fields", "f2,f3,f5,f6,f8,f12,f14,f15,f16,f17,f18,f23".to_string()),
        ];

        let data: Option<ListData> = self.fetch(&url, &query).await?;
        let rows: Vec<MarketSnapshot> = data
            .and_then(|d| d.diff)
            .unwrap_or_default()
            .iter()
            .map(Self::row_to_snapshot)
            .collect();

        if rows.is_empty() {
            return Err(CollectorError::DataNotAvailable(
                "Market snapshot is empty".into(),
            ));
        }

        Ok(apply_filters(rows, filters))
    }
}

// ============================================================================
// Eastmoney API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct EastmoneyResponse<T> {
    /// Return code (0 = success)
    rc: i32,
    /// Payload
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    /// K-line data as strings
    klines: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TickData {
    /// Tick details as strings
    details: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ListData {
    /// One object per instrument
    diff: Option<Vec<Map<String, Value>>>,
}

// ============================================================================
// Tests
// ============================================================================
