//! 翻译管道模块
//!
//! 提供文本判定、子树扫描、批次构建与防抖调度

pub mod batch;
pub mod collector;
pub mod debounce;
pub mod filters;

// 重新导出主要类型
pub use batch::{Batch, BatchBuilder, BatchUnit};
pub use collector::{PendingSet, ScanStats, TreeScanner};
pub use debounce::{DebounceScheduler, DebounceStats};
pub use filters::{Eligibility, RejectReason, TextFilter};
