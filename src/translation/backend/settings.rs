//! 设置存储
//!
//! 保存凭据与模型。翻译器在每次调用前重新读取，以便配置修改立即生效。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::translation::error::{TranslationError, TranslationResult};

/// 设置键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Credential,
    Model,
}

impl SettingKey {
    /// 持久化时使用的字段名
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::Credential => "apiKey",
            SettingKey::Model => "model",
        }
    }
}

/// 设置内容
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "apiKey", default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Settings {
    /// 读取设置值，空字符串视为未设置
    pub fn get(&self, key: SettingKey) -> Option<String> {
        let value = match key {
            SettingKey::Credential => self.credential.as_ref(),
            SettingKey::Model => self.model.as_ref(),
        };
        value.filter(|v| !v.trim().is_empty()).cloned()
    }

    pub fn set(&mut self, key: SettingKey, value: &str) {
        let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
        match key {
            SettingKey::Credential => self.credential = value,
            SettingKey::Model => self.model = value,
        }
    }
}

/// 设置存储接口
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: SettingKey) -> TranslationResult<Option<String>>;

    async fn set(&self, key: SettingKey, value: &str) -> TranslationResult<()>;
}

/// 内存设置存储
#[derive(Debug, Default)]
pub struct MemorySettings {
    settings: RwLock<Settings>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: &str) -> Self {
        let mut settings = Settings::default();
        settings.set(SettingKey::Credential, credential);
        Self {
            settings: RwLock::new(settings),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, key: SettingKey) -> TranslationResult<Option<String>> {
        Ok(self.settings.read().await.get(key))
    }

    async fn set(&self, key: SettingKey, value: &str) -> TranslationResult<()> {
        self.settings.write().await.set(key, value);
        Ok(())
    }
}

/// JSON 文件设置存储
///
/// 每次 `get` 都重新读取文件；文件不存在时视为空设置。
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// 从可能带有 `~` 的路径创建
    pub fn from_config_path(path: &str) -> Self {
        Self::new(shellexpand::tilde(path).into_owned())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取完整设置
    pub async fn load(&self) -> TranslationResult<Settings> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Settings::default()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                TranslationError::ConfigError(format!(
                    "解析设置文件 {} 失败: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(TranslationError::ConfigError(format!(
                "读取设置文件 {} 失败: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn store(&self, settings: &Settings) -> TranslationResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.path, content).await.map_err(|e| {
            TranslationError::ConfigError(format!(
                "写入设置文件 {} 失败: {}",
                self.path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl SettingsStore for FileSettings {
    async fn get(&self, key: SettingKey) -> TranslationResult<Option<String>> {
        Ok(self.load().await?.get(key))
    }

    async fn set(&self, key: SettingKey, value: &str) -> TranslationResult<()> {
        let mut settings = self.load().await?;
        settings.set(key, value);
        self.store(&settings).await?;
        tracing::debug!("已保存设置 {}", key.as_str());
        Ok(())
    }
}

/// 遮蔽凭据，仅保留末尾四个字符
pub fn mask_credential(credential: &str) -> String {
    let chars: Vec<char> = credential.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}
