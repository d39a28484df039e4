//! 存储模块
//!
//! 提供译文缓存与文本单元侧表。

pub mod cache;
pub mod units;

pub use cache::{CacheEntry, CacheStats, TranslationCache};
pub use units::{UnitState, UnitTable};
