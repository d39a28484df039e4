//! 翻译引擎核心实现
//!
//! 引擎包装一个 [`Translator`]，为每次后端调用加上超时与重试策略，并记录统计信息。
//! 它运行在调度器分配的并发槽位内，重试期间不会释放槽位。
//!
//! ## 主要功能
//! - **超时控制**: 每次调用都由 `tokio::time::timeout` 包装，超时映射为 `TimeoutError`
//! - **错误恢复**: 对可重试错误执行指数退避重试
//! - **性能统计**: 跟踪调用次数、字符数、错误数与累计耗时
//!
//! ## 使用示例
//! ```rust,ignore
//! use livetrans::translation::core::engine::{EngineConfig, TranslationEngine};
//!
//! let engine = TranslationEngine::new(translator, EngineConfig::default());
//! let translated = engine.translate(&texts).await?;
//! ```

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{sleep, timeout};

use crate::translation::backend::Translator;
use crate::translation::config::TranslationConfig;
use crate::translation::error::{TranslationError, TranslationResult};

/// 翻译引擎
///
/// 引擎本身是 `Send + Sync` 的，可以放在 `Arc` 中被多个调度任务共享；
/// 统计信息使用原子计数器。
pub struct TranslationEngine {
    /// 翻译后端
    translator: Arc<dyn Translator>,
    /// 翻译统计信息
    stats: EngineStats,
    /// 引擎配置参数
    config: EngineConfig,
}

impl TranslationEngine {
    /// 创建新的翻译引擎
    pub fn new(translator: Arc<dyn Translator>, config: EngineConfig) -> Self {
        Self {
            translator,
            stats: EngineStats::default(),
            config,
        }
    }

    /// 翻译一组去重后的文本
    ///
    /// # 参数
    /// - `texts`: 待翻译文本，结果与之按下标对齐
    ///
    /// # 错误
    /// - `TranslationError::TimeoutError`: 单次调用超过 `request_timeout`
    /// - `TranslationError::InternalError`: 后端返回的数量与输入不一致
    /// - 后端返回的其他错误，原样向上传递
    ///
    /// # 重试策略
    /// 只有 [`TranslationError::is_retryable`] 为真的错误才会重试，
    /// 第 n 次重试前等待 `retry_delay * 2^(n-1)`。
    pub async fn translate(&self, texts: &[String]) -> TranslationResult<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let start_time = Instant::now();
        self.stats.inc_calls();
        self.stats
            .add_characters_sent(texts.iter().map(|t| t.chars().count()).sum());

        let mut attempt = 0;
        let result = loop {
            match self.call_once(texts).await {
                Ok(translated) => break Ok(translated),
                Err(e) if e.is_retryable() && attempt < self.config.max_retry_attempts => {
                    attempt += 1;
                    self.stats.inc_retries();

                    // 指数退避：base_delay * 2^(attempt-1)
                    let delay = self.config.retry_delay * (1u32 << (attempt - 1).min(16));
                    tracing::warn!(
                        "{} 调用失败，{}ms后重试 (尝试 {}/{}): {}",
                        self.translator.name(),
                        delay.as_millis(),
                        attempt,
                        self.config.max_retry_attempts,
                        e
                    );
                    sleep(delay).await;
                }
                Err(e) => break Err(e),
            }
        };

        self.stats.add_processing_time(start_time.elapsed());

        match result {
            Ok(translated) if translated.len() != texts.len() => {
                self.stats.inc_translation_errors();
                Err(TranslationError::InternalError(format!(
                    "翻译结果数量不匹配: 期望 {}，得到 {}",
                    texts.len(),
                    translated.len()
                )))
            }
            Ok(translated) => {
                self.stats.add_characters_received(
                    translated.iter().map(|t| t.chars().count()).sum(),
                );
                Ok(translated)
            }
            Err(e) => {
                self.stats.inc_translation_errors();
                Err(e)
            }
        }
    }

    async fn call_once(&self, texts: &[String]) -> TranslationResult<Vec<String>> {
        match timeout(self.config.request_timeout, self.translator.translate(texts)).await {
            Ok(result) => result,
            Err(_) => {
                self.stats.inc_timeouts();
                Err(TranslationError::TimeoutError(format!(
                    "后端调用超过 {}ms 未返回",
                    self.config.request_timeout.as_millis()
                )))
            }
        }
    }

    /// 获取统计信息
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// 翻译引擎配置
///
/// # 字段说明
/// - `request_timeout`: 单次后端调用的超时时间
/// - `max_retry_attempts`: 可重试错误的最大重试次数，0 表示不重试
/// - `retry_delay`: 重试的基础延迟，实际延迟按指数递增
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub request_timeout: Duration,
    pub max_retry_attempts: usize,
    pub retry_delay: Duration,
}

impl EngineConfig {
    pub fn from_translation_config(config: &TranslationConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            max_retry_attempts: config.max_retry_attempts,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_translation_config(&TranslationConfig::default())
    }
}

/// 翻译引擎统计信息
///
/// 所有计数器都是累加的，使用 Relaxed 内存顺序，
/// 因为计数器之间的精确顺序并不重要。
#[derive(Debug, Default)]
pub struct EngineStats {
    /// 后端调用次数（一次 `translate` 计一次，不含重试）
    pub calls: AtomicUsize,
    /// 重试次数
    pub retries: AtomicUsize,
    /// 超时次数
    pub timeouts: AtomicUsize,
    /// 发送的字符总数
    pub characters_sent: AtomicUsize,
    /// 接收的字符总数
    pub characters_received: AtomicUsize,
    /// 最终失败的调用次数
    pub translation_errors: AtomicUsize,
    /// 累计耗时（微秒）
    pub total_processing_time: AtomicU64,
}

impl EngineStats {
    pub fn inc_calls(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retries(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_characters_sent(&self, count: usize) {
        self.characters_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_characters_received(&self, count: usize) {
        self.characters_received.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_translation_errors(&self) {
        self.translation_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// 时间以微秒为单位存储
    pub fn add_processing_time(&self, duration: Duration) {
        self.total_processing_time
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> usize {
        self.retries.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> usize {
        self.timeouts.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> usize {
        self.translation_errors.load(Ordering::Relaxed)
    }
}
