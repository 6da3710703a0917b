//! Tiered stock pool store.
//!
//! A pool is a named, file-persisted watch list split into three tiers:
//!
//! ```text
//! {name}_pool.json          level1 / level2 / level3 snapshot, rewritten on every mutation
//! {name}_pool_hist.jsonl    removed entries, append-only
//! ```

mod history;
mod performance;
mod store;
mod types;

pub use history::PoolHistory;
pub use performance::TierPerformance;
pub use store::StockPool;
pub use types::{PoolLevel, PoolTiers, StockPoolEntry};
