//! 翻译模块
//!
//! 采用分层的模块化架构：
//! - **backend**: 翻译后端接口、HTTP 实现、设置存储与消息通道
//! - **core**: 翻译会话、修改观察、DOM 补丁、并发调度与引擎
//! - **pipeline**: 文本判定、扫描、分批与防抖
//! - **storage**: 译文缓存与单元侧表
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,ignore
//! use livetrans::translation::{TranslationConfig, TranslationSession};
//!
//! let config = TranslationConfig::default();
//! let session = TranslationSession::with_translator(document, root, &config, cache, translator);
//! session.start();
//! session.wait_idle().await;
//! ```

/// 翻译后端模块 - 后端接口与消息契约
pub mod backend;

/// 配置管理模块 - 批次预算、并发上限、过滤规则等
pub mod config;

/// 核心模块 - 会话、观察、补丁、调度与引擎
pub mod core;

/// 错误处理模块 - 统一的错误类型和处理机制
pub mod error;

/// 文本处理管道模块 - 判定、扫描、分批与防抖
pub mod pipeline;

/// 存储管理模块 - 译文缓存与单元侧表
pub mod storage;

// ============================================================================
// 核心API导出
// ============================================================================

pub use backend::{
    BackgroundWorker, BridgeClient, BridgeRequest, BridgeResponse, ChatTranslator, FileSettings,
    MemorySettings, SettingKey, Settings, SettingsStore, Translator,
};
pub use config::{constants, ConfigManager, TranslationConfig};
pub use core::{
    Dispatcher, EngineConfig, PatchOutcome, SessionStats, TranslationEngine, TranslationSession,
};
pub use error::{ErrorCategory, ErrorSeverity, TranslationError, TranslationResult};
pub use pipeline::{Batch, BatchBuilder, Eligibility, RejectReason, TextFilter, TreeScanner};
pub use storage::{CacheEntry, CacheStats, TranslationCache, UnitTable};
