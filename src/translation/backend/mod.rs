//! 翻译后端
//!
//! - `Translator`: 不透明的异步翻译接口，输入去重后的文本，输出按下标对齐的译文
//! - `chat`: 基于 chat-completions HTTP 接口的实现
//! - `settings`: 凭据与模型的键值存储
//! - `bridge`: 页面侧与请求侧之间的消息契约

use std::sync::Arc;

use async_trait::async_trait;

use crate::translation::error::TranslationResult;

pub mod bridge;
pub mod chat;
pub mod settings;

pub use bridge::{BackgroundWorker, BridgeClient, BridgeRequest, BridgeResponse};
pub use chat::ChatTranslator;
pub use settings::{FileSettings, MemorySettings, SettingKey, Settings, SettingsStore};

/// 翻译后端
///
/// 返回值必须与输入按下标一一对应。无法解析的响应应退化为原样返回输入，
/// 而不是报错。
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, texts: &[String]) -> TranslationResult<Vec<String>>;

    /// 用于日志的后端名称
    fn name(&self) -> &str {
        "translator"
    }
}

#[async_trait]
impl<T: Translator + ?Sized> Translator for Arc<T> {
    async fn translate(&self, texts: &[String]) -> TranslationResult<Vec<String>> {
        (**self).translate(texts).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
