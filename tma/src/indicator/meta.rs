//! Indicator metadata registry.
//!
//! Human-readable explanations used only for report rendering. Keys of the
//! form `M` + digits resolve against the market registry; anything else is
//! matched by share indicator family. A key with no entry has no
//! explanation, which is not an error.

use serde::Serialize;

/// Explanation of one indicator key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndicatorMeta {
    /// What the indicator measures
    pub explain: String,
    /// How it is computed, when not obvious
    pub cal_method: Option<String>,
}

impl IndicatorMeta {
    fn new(explain: impl Into<String>, cal_method: Option<&str>) -> Self {
        Self {
            explain: explain.into(),
            cal_method: cal_method.map(str::to_string),
        }
    }
}

// ============================================================================
// Market Registry (M + 3 digits)
// ============================================================================

/// A-share whole-market daily indicators: (key, explain, method)
const MARKET_INDICATOR_META: &[(&str, &str, Option<&str>)] = &[
    ("M001", "全市场赚钱效应", Some("全市场上涨个股数量 / 开盘个股总数")),
    ("M002", "开盘个股数量", None),
    ("M003", "上涨个股数量", None),
    ("M004", "涨3个点以上个股数量", None),
    ("M005", "跌3个点以上个股数量", None),
    (
        "M006",
        "换手率前五十只股票的赚钱效应",
        Some("换手率前五十只股票中上涨个股数量 / 50"),
    ),
    ("M007", "换手率前五十只股票中涨3个点以上的数量", None),
    ("M008", "换手率前五十只股票中跌3个点以上的数量", None),
    (
        "M009",
        "涨停板个股数量",
        Some("（最高价 > 昨收 × 涨停系数）且（现价 == 最高价）且（最高价 != 最低价）的个股总数"),
    ),
    (
        "M010",
        "一字涨停板个股数量",
        Some("（最高价 > 昨收 × 涨停系数）且（最高价 == 最低价）的个股总数"),
    ),
    (
        "M011",
        "盘中触及涨停板个股数量",
        Some("（最高价 > 昨收 × 涨停系数）且（现价 < 最高价）的个股总数"),
    ),
    (
        "M012",
        "涨停封板成功率",
        Some("（涨停板 + 一字涨停板）/（涨停板 + 一字涨停板 + 盘中触及涨停板）"),
    ),
    (
        "M013",
        "跌停板个股数量",
        Some("（最低价 < 昨收 × 跌停系数）且（现价 == 最低价）且（最高价 != 最低价）的个股总数"),
    ),
    (
        "M014",
        "一字跌停板个股数量",
        Some("（最低价 < 昨收 × 跌停系数）且（最高价 == 最低价）的个股总数"),
    ),
    (
        "M015",
        "盘中触及跌停板个股数量",
        Some("（最低价 < 昨收 × 跌停系数）且（现价 > 最低价）的个股总数"),
    ),
    (
        "M016",
        "跌停封板成功率",
        Some("（跌停板 + 一字跌停板）/（跌停板 + 一字跌停板 + 盘中触及跌停板）"),
    ),
];

// ============================================================================
// Share Registry (by key family)
// ============================================================================

/// Fixed share keys: (key, explain, method)
const SHARE_INDICATOR_META: &[(&str, &str, Option<&str>)] = &[
    ("DATE", "计算日期", None),
    ("CODE", "股票代码", None),
    ("PRICE", "最新价", None),
    ("NAME", "股票名称", None),
    ("TOTAL_AMOUNT", "当日成交金额（元）", None),
    ("CHANGE_RATE", "当日涨跌幅", Some("（最新价 - 开盘价）/ 开盘价")),
    ("WAVE_RATE", "当日振幅", Some("（最高价 - 最低价）/ 开盘价")),
    ("BUY_AMOUNT", "当日主动买盘成交金额（元）", Some("买盘分笔 价格 × 成交量 之和")),
    ("SELL_AMOUNT", "当日主动卖盘成交金额（元）", Some("卖盘分笔 价格 × 成交量 之和")),
    ("NEUTRAL_AMOUNT", "当日中性盘成交金额（元）", Some("中性及未知方向分笔 价格 × 成交量 之和")),
    ("BUY_FIRST", "买一总挂单金额（元）", Some("买一价 × 买一量")),
    ("SELL_FIRST", "卖一总挂单金额（元）", Some("卖一价 × 卖一量")),
];

/// Look up the metadata of an indicator key.
pub fn check_indicator_meta(key: &str) -> Option<IndicatorMeta> {
    if is_market_key(key) {
        return MARKET_INDICATOR_META
            .iter()
            .find(|(k, _, _)| *k == key)
            .map(|(_, explain, method)| IndicatorMeta::new(*explain, *method));
    }

    if let Some((_, explain, method)) = SHARE_INDICATOR_META.iter().find(|(k, _, _)| *k == key) {
        return Some(IndicatorMeta::new(*explain, *method));
    }

    share_family_meta(key)
}

fn is_market_key(key: &str) -> bool {
    key.len() > 1
        && key.starts_with('M')
        && key[1..].chars().all(|c| c.is_ascii_digit())
}

/// Windowed share keys such as `MA20_D` or `WAVE_RATE_A10`
fn share_family_meta(key: &str) -> Option<IndicatorMeta> {
    if let Some(days) = key.strip_prefix("MA").and_then(|rest| rest.strip_suffix("_D")) {
        let n = window(days)?;
        return Some(IndicatorMeta::new(
            format!("{}日均线", n),
            Some("最近N个交易日收盘价的算术平均（不足N日时取全部已有数据）"),
        ));
    }

    let families: &[(&str, &str, Option<&str>)] = &[
        ("HIGH_", "最近{}个交易日最高价", None),
        ("LOW_", "最近{}个交易日最低价", None),
        (
            "CHANGE_",
            "最近{}个交易日涨跌幅",
            Some("（窗口末收盘价 - 窗口首收盘价）/ 窗口首收盘价"),
        ),
        (
            "MAX_DOWN_",
            "最近{}个交易日最大回撤",
            Some("（窗口末收盘价 - 窗口最高价）/ 窗口最高价"),
        ),
        (
            "WAVE_RATE_A",
            "最近{}个交易日平均每日波动率",
            Some("每日（最高价 - 最低价）/ 开盘价 的均值"),
        ),
        (
            "WAVE_RATE_T",
            "最近{}个交易日累计波动率",
            Some("（窗口最高价 - 窗口最低价）/ 窗口首日开盘价"),
        ),
    ];

    families.iter().find_map(|(prefix, explain, method)| {
        let n = window(key.strip_prefix(prefix)?)?;
        Some(IndicatorMeta::new(explain.replace("{}", &n.to_string()), *method))
    })
}

fn window(raw: &str) -> Option<usize> {
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}
