//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量读取，覆盖配置文件中的同名选项

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    /// 读取并解析变量；未设置时返回错误，由调用方决定是否回退
    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => Err(EnvError {
                variable: Self::NAME.to_string(),
                message: "Environment variable not set".to_string(),
            }),
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "LIVETRANS_LOG_LEVEL";
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 翻译后端相关环境变量
pub mod backend {
    use super::*;

    /// API URL
    pub struct ApiUrl;
    impl EnvVar<String> for ApiUrl {
        const NAME: &'static str = "LIVETRANS_API_URL";
        const DESCRIPTION: &'static str = "Chat-completions endpoint used for translation";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(url.to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API URL must start with http:// or https://".to_string(),
                })
            }
        }
    }

    /// 默认模型
    pub struct Model;
    impl EnvVar<String> for Model {
        const NAME: &'static str = "LIVETRANS_MODEL";
        const DESCRIPTION: &'static str = "Model used when the settings store has none";

        fn parse(value: &str) -> EnvResult<String> {
            parse_non_empty(value, Self::NAME)
        }
    }

    /// 目标语言
    pub struct TargetLanguage;
    impl EnvVar<String> for TargetLanguage {
        const NAME: &'static str = "LIVETRANS_TARGET_LANGUAGE";
        const DESCRIPTION: &'static str = "Target language named in the system prompt";

        fn parse(value: &str) -> EnvResult<String> {
            parse_non_empty(value, Self::NAME)
        }
    }

    /// 最大并发请求数
    pub struct MaxConcurrentRequests;
    impl EnvVar<usize> for MaxConcurrentRequests {
        const NAME: &'static str = "LIVETRANS_MAX_CONCURRENT_REQUESTS";
        const DESCRIPTION: &'static str = "Maximum concurrent requests to the translation API";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 64)
        }
    }

    /// 单次请求超时
    pub struct RequestTimeout;
    impl EnvVar<Duration> for RequestTimeout {
        const NAME: &'static str = "LIVETRANS_REQUEST_TIMEOUT";
        const DESCRIPTION: &'static str = "Per-call backend timeout in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds = parse_positive_usize(value, Self::NAME, 1, 600)?;
            Ok(Duration::from_secs(seconds as u64))
        }
    }

    /// 最大重试次数
    pub struct MaxRetryAttempts;
    impl EnvVar<usize> for MaxRetryAttempts {
        const NAME: &'static str = "LIVETRANS_MAX_RETRY_ATTEMPTS";
        const DESCRIPTION: &'static str = "Retries for retryable backend failures (0 disables)";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 0, 10)
        }
    }

    /// 设置文件路径
    pub struct SettingsPath;
    impl EnvVar<String> for SettingsPath {
        const NAME: &'static str = "LIVETRANS_SETTINGS_PATH";
        const DESCRIPTION: &'static str = "JSON file holding the credential and model";

        fn parse(value: &str) -> EnvResult<String> {
            parse_non_empty(value, Self::NAME)
        }
    }
}

/// 批次相关环境变量
pub mod batching {
    use super::*;

    /// 批次字符上限
    pub struct CharLimit;
    impl EnvVar<usize> for CharLimit {
        const NAME: &'static str = "LIVETRANS_BATCH_CHAR_LIMIT";
        const DESCRIPTION: &'static str = "Maximum characters per translation batch";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 50000)
        }
    }

    /// 防抖静默期
    pub struct Debounce;
    impl EnvVar<Duration> for Debounce {
        const NAME: &'static str = "LIVETRANS_DEBOUNCE_MS";
        const DESCRIPTION: &'static str = "Quiet period before mutations are flushed, in ms";

        fn parse(value: &str) -> EnvResult<Duration> {
            let millis = parse_positive_usize(value, Self::NAME, 0, 60_000)?;
            Ok(Duration::from_millis(millis as u64))
        }
    }
}

/// 辅助函数
fn parse_non_empty(value: &str, var_name: &str) -> EnvResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(EnvError {
            variable: var_name.to_string(),
            message: "Value must not be empty".to_string(),
        })
    } else {
        Ok(trimmed.to_string())
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

/// 生成环境变量说明文档
pub fn generate_env_docs() -> String {
    let entries: &[(&str, &str)] = &[
        (core::LogLevel::NAME, core::LogLevel::DESCRIPTION),
        (backend::ApiUrl::NAME, backend::ApiUrl::DESCRIPTION),
        (backend::Model::NAME, backend::Model::DESCRIPTION),
        (backend::TargetLanguage::NAME, backend::TargetLanguage::DESCRIPTION),
        (
            backend::MaxConcurrentRequests::NAME,
            backend::MaxConcurrentRequests::DESCRIPTION,
        ),
        (backend::RequestTimeout::NAME, backend::RequestTimeout::DESCRIPTION),
        (backend::MaxRetryAttempts::NAME, backend::MaxRetryAttempts::DESCRIPTION),
        (backend::SettingsPath::NAME, backend::SettingsPath::DESCRIPTION),
        (batching::CharLimit::NAME, batching::CharLimit::DESCRIPTION),
        (batching::Debounce::NAME, batching::Debounce::DESCRIPTION),
    ];

    entries
        .iter()
        .map(|(name, description)| format!("{:<36} {}", name, description))
        .collect::<Vec<_>>()
        .join("\n")
}
