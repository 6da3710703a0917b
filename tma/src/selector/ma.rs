//! Moving-average screens.
//!
//! | Rule   | Hit when                                            |
//! |--------|-----------------------------------------------------|
//! | `SS01` | PRICE < 0.9 × MA5_D                                 |
//! | `SS02` | abs(MA5_D - MA10_D) <= 0.1% of PRICE                |
//! | `SS03` | MA120_D > MA60_D > MA30_D > MA20_D > MA10_D > MA5_D |

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tma_common::{Error, IndicatorConfig, Result};
use tracing::{debug, info};

use super::{ScreenResult, ScreenedShare};
use crate::collector::Collector;
use crate::indicator::{IndicatorSet, ShareDayIndicator, ShareTarget};

/// Windows the rules read
const SCREEN_MA_WINDOWS: [usize; 6] = [5, 10, 20, 30, 60, 120];

const SCREEN_TARGETS: [ShareTarget; 2] = [ShareTarget::Basic, ShareTarget::MovingAverage];

// ============================================================================
// Rules
// ============================================================================

/// One moving-average screen rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaRule {
    /// Price more than 10% below MA5
    Ss01,
    /// MA5 and MA10 within 0.1% of price
    Ss02,
    /// Fully bearish alignment from MA120 down to MA5
    Ss03,
}

impl MaRule {
    pub const ALL: [MaRule; 3] = [Self::Ss01, Self::Ss02, Self::Ss03];

    pub fn id(self) -> &'static str {
        match self {
            Self::Ss01 => "SS01",
            Self::Ss02 => "SS02",
            Self::Ss03 => "SS03",
        }
    }

    /// Reason recorded on pool entries
    pub fn reason(self) -> &'static str {
        match self {
            Self::Ss01 => "当前价格向下偏离MA5_D超过10个点",
            Self::Ss02 => "MA5_D与MA10_D相互靠近（差的绝对值小于0.1%）",
            Self::Ss03 => {
                "日K线完全空头排列（MA120_D > MA60_D > MA30_D > MA20_D > MA10_D > MA5_D）"
            }
        }
    }

    /// Parse "SS01".."SS03", case-insensitive.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "SS01" => Ok(Self::Ss01),
            "SS02" => Ok(Self::Ss02),
            "SS03" => Ok(Self::Ss03),
            other => Err(Error::Configuration(format!(
                "Unknown screen rule '{}': expected SS01, SS02 or SS03",
                other
            ))),
        }
    }

    /// Whether `set` satisfies the rule; a missing key never matches.
    pub fn matches(self, set: &IndicatorSet) -> bool {
        let ma = |window: usize| set.get_f64(&format!("MA{}_D", window));
        let price = set.get_f64("PRICE");

        match self {
            Self::Ss01 => match (price, ma(5)) {
                (Some(price), Some(ma5)) => price < 0.9 * ma5,
                _ => false,
            },
            Self::Ss02 => match (price, ma(5), ma(10)) {
                (Some(price), Some(ma5), Some(ma10)) => (ma5 - ma10).abs() <= price * 0.001,
                _ => false,
            },
            Self::Ss03 => {
                let chain: Option<Vec<f64>> =
                    [120, 60, 30, 20, 10, 5].iter().map(|&w| ma(w)).collect();
                chain.is_some_and(|values| values.windows(2).all(|pair| pair[0] > pair[1]))
            }
        }
    }
}

// ============================================================================
// Screen
// ============================================================================

/// Runs moving-average rules over a list of codes.
#[derive(Debug, Clone)]
pub struct MaShareScreen {
    config: IndicatorConfig,
    rules: Vec<MaRule>,
}

impl MaShareScreen {
    /// `rules` empty means every rule.
    pub fn new(config: &IndicatorConfig, rules: &[MaRule]) -> Self {
        let config = IndicatorConfig {
            ma_windows: SCREEN_MA_WINDOWS.to_vec(),
            nd_windows: Vec::new(),
            ..config.clone()
        };
        let rules = if rules.is_empty() {
            MaRule::ALL.to_vec()
        } else {
            rules.to_vec()
        };

        Self { config, rules }
    }

    pub fn rules(&self) -> &[MaRule] {
        &self.rules
    }

    /// Compute basic and moving-average indicators per code, then apply
    /// every rule in order.
    ///
    /// A code whose collection fails or whose report is incomplete is
    /// recorded as a failure and skipped; fatal errors abort the run.
    pub async fn run(&self, collector: &dyn Collector, codes: &[String]) -> Result<ScreenResult> {
        let started = Instant::now();
        info!(
            codes = codes.len(),
            rules = ?self.rules.iter().map(|r| r.id()).collect::<Vec<_>>(),
            "Starting MA screen"
        );

        let mut result = ScreenResult::default();
        let mut sets = Vec::with_capacity(codes.len());

        for code in codes {
            result.total_scanned += 1;

            let indicator = ShareDayIndicator::new(code.as_str(), &self.config);
            let report = match indicator.collect(collector, &SCREEN_TARGETS).await {
                Ok(report) => report,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    result.record_failure(code.as_str(), e.to_string());
                    continue;
                }
            };

            if !report.is_complete() {
                let reasons: Vec<String> = report
                    .failures
                    .iter()
                    .map(|f| format!("{}: {}", f.scope, f.error))
                    .collect();
                result.record_failure(code.as_str(), reasons.join("; "));
                continue;
            }

            debug!(code = %code, "Share indicators ready");
            sets.push((code.as_str(), report.indicators));
        }

        for &rule in &self.rules {
            for (code, set) in &sets {
                if let Some(hit) = screen_one(rule, code, set) {
                    result.hits.push(hit);
                }
            }
        }

        result.duration_secs = started.elapsed().as_secs_f64();
        info!(
            scanned = result.total_scanned,
            hits = result.hits.len(),
            failed = result.failures.len(),
            "MA screen complete"
        );

        Ok(result)
    }
}

fn screen_one(rule: MaRule, code: &str, set: &IndicatorSet) -> Option<ScreenedShare> {
    if !rule.matches(set) {
        return None;
    }

    Some(ScreenedShare {
        code: code.to_string(),
        name: set.get("NAME").map(ToString::to_string).unwrap_or_default(),
        price: set.get_f64("PRICE").unwrap_or(0.0),
        rule: rule.id().to_string(),
        reason: rule.reason().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(price: f64, mas: &[(usize, f64)]) -> IndicatorSet {
        let mut set = IndicatorSet::new();
        set.insert("PRICE", price);
        for &(window, value) in mas {
            set.insert(format!("MA{}_D", window), value);
        }
        set
    }

    #[test]
    fn test_ss01_needs_a_deep_drop() {
        assert!(MaRule::Ss01.matches(&set(8.9, &[(5, 10.0)])));
        assert!(!MaRule::Ss01.matches(&set(9.0, &[(5, 10.0)])));
        assert!(!MaRule::Ss01.matches(&set(8.0, &[])));
    }

    #[test]
    fn test_ss02_gap_scales_with_price() {
        assert!(MaRule::Ss02.matches(&set(100.0, &[(5, 10.05), (10, 10.0)])));
        assert!(!MaRule::Ss02.matches(&set(10.0, &[(5, 10.05), (10, 10.0)])));
    }

    #[test]
    fn test_ss03_requires_strict_order() {
        let bearish = [(5, 1.0), (10, 2.0), (20, 3.0), (30, 4.0), (60, 5.0), (120, 6.0)];
        assert!(MaRule::Ss03.matches(&set(1.0, &bearish)));

        let flat = [(5, 1.0), (10, 2.0), (20, 3.0), (30, 3.0), (60, 5.0), (120, 6.0)];
        assert!(!MaRule::Ss03.matches(&set(1.0, &flat)));
        assert!(!MaRule::Ss03.matches(&set(1.0, &bearish[..5])));
    }

    #[test]
    fn test_parse_rules() {
        assert_eq!(MaRule::parse("ss02").unwrap(), MaRule::Ss02);
        assert!(MaRule::parse("SS04").unwrap_err().is_configuration());
    }

    #[test]
    fn test_new_fixes_windows() {
        let screen = MaShareScreen::new(&IndicatorConfig::default(), &[]);
        assert_eq!(screen.config.ma_windows, SCREEN_MA_WINDOWS.to_vec());
        assert!(screen.config.nd_windows.is_empty());
        assert_eq!(screen.rules(), &MaRule::ALL);
    }
}
