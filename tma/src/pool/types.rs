//! Stock pool types.
//!
//! Defines the three-tier membership model: tier 1 holds the highest
//! conviction picks (一级股票池), tier 3 the broadest watch list.

use serde::{Deserialize, Serialize};
use tma_common::{Error, Result};

// ============================================================================
// Tier Types
// ============================================================================

/// Pool tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PoolLevel {
    /// Highest conviction / most restrictive criteria
    Level1,
    /// Intermediate tier
    Level2,
    /// Broadest watch tier
    Level3,
}

impl PoolLevel {
    /// All tiers in order
    pub const ALL: [PoolLevel; 3] = [Self::Level1, Self::Level2, Self::Level3];

    /// Numeric tier (1, 2, 3)
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Level1 => 1,
            Self::Level2 => 2,
            Self::Level3 => 3,
        }
    }
}

impl TryFrom<i64> for PoolLevel {
    type Error = Error;

    fn try_from(level: i64) -> Result<Self> {
        match level {
            1 => Ok(Self::Level1),
            2 => Ok(Self::Level2),
            3 => Ok(Self::Level3),
            other => Err(Error::InvalidLevel(other)),
        }
    }
}

impl TryFrom<u8> for PoolLevel {
    type Error = Error;

    fn try_from(level: u8) -> Result<Self> {
        Self::try_from(i64::from(level))
    }
}

impl std::fmt::Display for PoolLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Level1 => write!(f, "一级股票池"),
            Self::Level2 => write!(f, "二级股票池"),
            Self::Level3 => write!(f, "三级股票池"),
        }
    }
}

// ============================================================================
// Entry Types
// ============================================================================

/// One membership record.
///
/// The same code may appear several times in one tier with different reasons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPoolEntry {
    /// Ticker code ("600682")
    pub code: String,
    /// When the entry was added ("2024-01-02 09:45:00" or "2024-01-02")
    #[serde(rename = "dt")]
    pub added_at: String,
    /// Tier number (1, 2, 3)
    pub level: u8,
    /// Selection rule name or free-text explanation
    pub reason: String,
}

/// Entries of a pool partitioned by tier, in insertion order.
///
/// Serialized with `level1`/`level2`/`level3` keys, which is also the
/// on-disk snapshot layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolTiers {
    #[serde(default)]
    pub level1: Vec<StockPoolEntry>,
    #[serde(default)]
    pub level2: Vec<StockPoolEntry>,
    #[serde(default)]
    pub level3: Vec<StockPoolEntry>,
}

impl PoolTiers {
    /// Entries of one tier
    pub fn get(&self, level: PoolLevel) -> &[StockPoolEntry] {
        match level {
            PoolLevel::Level1 => &self.level1,
            PoolLevel::Level2 => &self.level2,
            PoolLevel::Level3 => &self.level3,
        }
    }

    /// Mutable entries of one tier
    pub fn get_mut(&mut self, level: PoolLevel) -> &mut Vec<StockPoolEntry> {
        match level {
            PoolLevel::Level1 => &mut self.level1,
            PoolLevel::Level2 => &mut self.level2,
            PoolLevel::Level3 => &mut self.level3,
        }
    }

    /// Every entry, tier 1 first
    pub fn iter(&self) -> impl Iterator<Item = &StockPoolEntry> {
        self.level1
            .iter()
            .chain(self.level2.iter())
            .chain(self.level3.iter())
    }

    /// Total number of entries across tiers
    pub fn len(&self) -> usize {
        self.level1.len() + self.level2.len() + self.level3.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
