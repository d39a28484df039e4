//! 翻译配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, TranslationConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 批次处理相关
    pub const BATCH_CHAR_LIMIT: usize = 500;
    pub const DEBOUNCE_DELAY_MS: u64 = 200;
    pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

    // 文本过滤相关
    pub const MIN_TEXT_LENGTH: usize = 2;

    // 默认API设置
    pub const DEFAULT_API_URL: &str = "https://api.deepseek.com/chat/completions";
    pub const DEFAULT_MODEL: &str = "deepseek-chat";
    pub const DEFAULT_TARGET_LANGUAGE: &str = "Chinese";
    pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 6;
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

    // 跳过的容器元素
    pub const IGNORE_TAGS: &[&str] = &[
        "script", "style", "code", "pre", "noscript", "textarea", "input",
    ];

    // 标记已处理容器的类名
    pub const IGNORE_CLASSES: &[&str] = &["ds-translated-wrapper", "ds-original-hidden"];

    // 译文注释节点
    pub const ANNOTATION_TAG: &str = "font";
    pub const ANNOTATION_CLASS: &str = "livetrans-trans-node";

    // 设置存储
    pub const DEFAULT_SETTINGS_PATH: &str = "~/.config/livetrans/settings.json";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "livetrans.toml",
        ".livetrans.toml",
        "~/.config/livetrans/config.toml",
        "/etc/livetrans/config.toml",
    ];
}

/// 加载配置，失败时回退到默认值
pub fn load_translation_config() -> TranslationConfig {
    match ConfigManager::new() {
        Ok(manager) => manager.into_config(),
        Err(e) => {
            tracing::warn!("配置加载失败，使用默认配置: {}", e);
            TranslationConfig::default()
        }
    }
}
