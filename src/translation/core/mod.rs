//! 翻译系统核心模块
//!
//! 页面侧与请求侧在这里汇合：
//!
//! - **会话层** (`service.rs`): `TranslationSession`，负责扫描、排队、缓存查找、分批与应用结果
//! - **观察层** (`watcher.rs`): 把文档修改记录转换为待处理单元
//! - **补丁层** (`patcher.rs`): 插入或改写译文节点并清空原文
//! - **调度层** (`dispatcher.rs`): 全局并发上限与先进先出排队
//! - **引擎层** (`engine.rs`): 单次后端调用的超时、重试与统计
//!
//! 页面侧类型持有 `Rc`，只能在 `LocalSet` 内使用；请求侧类型是 `Send + Sync` 的。

pub mod dispatcher;
pub mod engine;
pub mod patcher;
pub mod service;
pub mod watcher;

pub use dispatcher::{DispatchStats, Dispatcher, Ticket};
pub use engine::{EngineConfig, EngineStats, TranslationEngine};
pub use patcher::{DomPatcher, PatchOutcome};
pub use service::{SessionStats, TranslationSession};
pub use watcher::{MutationWatcher, WatchStats};
