//! 简化的配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::{TranslationError, TranslationResult};

/// 翻译配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // 后端配置
    pub api_url: String,
    pub default_model: String,
    pub target_language: String,

    // 批次配置
    pub batch_char_limit: usize,
    pub debounce_ms: u64,

    // 并发配置
    pub max_concurrent_requests: usize,
    pub queue_capacity: usize,
    pub request_timeout_secs: u64,
    pub max_retry_attempts: usize,
    pub retry_delay_ms: u64,

    // 过滤配置
    pub min_text_chars: usize,
    pub ignore_tags: Vec<String>,
    pub ignore_classes: Vec<String>,
    pub annotation_tag: String,
    pub annotation_class: String,

    // 缓存配置
    pub cache_max_entries: Option<usize>,

    // 设置存储
    pub settings_path: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            api_url: constants::DEFAULT_API_URL.to_string(),
            default_model: constants::DEFAULT_MODEL.to_string(),
            target_language: constants::DEFAULT_TARGET_LANGUAGE.to_string(),

            batch_char_limit: constants::BATCH_CHAR_LIMIT,
            debounce_ms: constants::DEBOUNCE_DELAY_MS,

            max_concurrent_requests: constants::DEFAULT_MAX_CONCURRENT_REQUESTS,
            queue_capacity: constants::DEFAULT_QUEUE_CAPACITY,
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            max_retry_attempts: 0,
            retry_delay_ms: constants::DEFAULT_RETRY_DELAY_MS,

            min_text_chars: constants::MIN_TEXT_LENGTH,
            ignore_tags: constants::IGNORE_TAGS.iter().map(|s| s.to_string()).collect(),
            ignore_classes: constants::IGNORE_CLASSES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            annotation_tag: constants::ANNOTATION_TAG.to_string(),
            annotation_class: constants::ANNOTATION_CLASS.to_string(),

            cache_max_entries: None,

            settings_path: constants::DEFAULT_SETTINGS_PATH.to_string(),
        }
    }
}

impl TranslationConfig {
    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.batch_char_limit == 0 {
            return Err(TranslationError::ConfigError("批次字符上限不能为0".to_string()));
        }

        if self.max_concurrent_requests == 0 {
            return Err(TranslationError::ConfigError("最大并发数不能为0".to_string()));
        }

        if self.queue_capacity == 0 {
            return Err(TranslationError::ConfigError("队列容量不能为0".to_string()));
        }

        if self.min_text_chars == 0 {
            return Err(TranslationError::ConfigError("最小文本长度不能为0".to_string()));
        }

        if self.cache_max_entries == Some(0) {
            return Err(TranslationError::ConfigError("缓存容量不能为0".to_string()));
        }

        if self.annotation_class.trim().is_empty() {
            return Err(TranslationError::ConfigError("译文节点类名不能为空".to_string()));
        }

        match url::Url::parse(&self.api_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => {
                return Err(TranslationError::ConfigError(format!(
                    "不支持的API协议: {}",
                    url.scheme()
                )))
            }
            Err(e) => {
                return Err(TranslationError::ConfigError(format!(
                    "无效的API地址 {}: {}",
                    self.api_url, e
                )))
            }
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{batching, backend, EnvVar};

        if let Ok(api_url) = backend::ApiUrl::get() {
            tracing::info!("环境变量覆盖 API URL: {}", api_url);
            self.api_url = api_url;
        }

        if let Ok(model) = backend::Model::get() {
            self.default_model = model;
        }

        if let Ok(language) = backend::TargetLanguage::get() {
            self.target_language = language;
        }

        if let Ok(max_concurrent) = backend::MaxConcurrentRequests::get() {
            self.max_concurrent_requests = max_concurrent;
        }

        if let Ok(timeout) = backend::RequestTimeout::get() {
            self.request_timeout_secs = timeout.as_secs();
        }

        if let Ok(retries) = backend::MaxRetryAttempts::get() {
            self.max_retry_attempts = retries;
        }

        if let Ok(limit) = batching::CharLimit::get() {
            self.batch_char_limit = limit;
        }

        if let Ok(debounce) = batching::Debounce::get() {
            self.debounce_ms = debounce.as_millis() as u64;
        }

        if let Ok(path) = backend::SettingsPath::get() {
            self.settings_path = path;
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 简化的配置管理器
pub struct ConfigManager {
    config: TranslationConfig,
}

impl ConfigManager {
    /// 按默认搜索路径创建配置管理器
    pub fn new() -> TranslationResult<Self> {
        let mut config = Self::load_config()?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 从指定文件创建配置管理器
    pub fn from_path<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        Self::load_dotenv();

        let mut config = Self::load_from_file(path.as_ref())?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn into_config(self) -> TranslationConfig {
        self.config
    }

    /// 从文件加载配置
    fn load_config() -> TranslationResult<TranslationConfig> {
        // 首先尝试加载 .env 文件
        Self::load_dotenv();

        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(Path::new(expanded_path.as_ref()));
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(TranslationConfig::default())
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &Path) -> TranslationResult<TranslationConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::ConfigError(format!("读取配置文件失败: {}", e)))?;

        if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析TOML配置失败: {}", e)))
        } else {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析JSON配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> TranslationResult<()> {
        let config = TranslationConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| TranslationError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
