//! # Livetrans Library
//!
//! 对“活的” HTML 文档做增量翻译：扫描可翻译的文本节点，按字符预算去重分批，
//! 经有并发上限的请求侧调用翻译后端，把译文作为紧随原文的注释节点写回，
//! 并持续观察文档修改，对新增或变化的文本做同样的处理。
//!
//! ## 模块组织
//!
//! - `core` - 文档级入口，解析、翻译并序列化一份 HTML
//! - `document` - 带修改通知的 DOM 包装
//! - `parsers` - HTML 解析、DOM 查询与序列化
//! - `translation` - 翻译管道、会话、后端与存储
//! - `env` - 环境变量定义

pub mod core;
pub mod document;
pub mod env;
pub mod parsers;
pub mod translation;

pub use crate::core::{translate_html, DocumentTranslator, TranslatedDocument};
pub use document::LiveDocument;
pub use translation::{TranslationConfig, TranslationError, TranslationResult, TranslationSession};
