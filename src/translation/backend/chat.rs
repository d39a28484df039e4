//! chat-completions 翻译后端
//!
//! 每次调用前从设置存储读取凭据与模型；响应内容去掉 Markdown 代码块标记后
//! 解析为字符串数组。内容无法解析时原样返回输入。

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::settings::{SettingKey, SettingsStore};
use super::Translator;
use crate::translation::config::TranslationConfig;
use crate::translation::error::{TranslationError, TranslationResult};

/// 请求体
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// 基于 HTTP 的翻译后端
pub struct ChatTranslator {
    client: reqwest::Client,
    api_url: String,
    default_model: String,
    target_language: String,
    settings: Arc<dyn SettingsStore>,
    fence: Regex,
}

impl ChatTranslator {
    pub fn new(config: &TranslationConfig, settings: Arc<dyn SettingsStore>) -> TranslationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("创建HTTP客户端失败: {}", e)))?;

        Self::with_client(client, config, settings)
    }

    pub fn with_client(
        client: reqwest::Client,
        config: &TranslationConfig,
        settings: Arc<dyn SettingsStore>,
    ) -> TranslationResult<Self> {
        let fence = Regex::new(r"```(?:json)?")
            .map_err(|e| TranslationError::InternalError(format!("代码块正则无效: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            default_model: config.default_model.clone(),
            target_language: config.target_language.clone(),
            settings,
            fence,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn system_prompt(&self) -> String {
        format!(
            "Translate to {}. Keep technical terms. Return ONLY a JSON array of strings.",
            self.target_language
        )
    }

    pub fn build_request(&self, model: String, texts: &[String]) -> TranslationResult<ChatRequest> {
        Ok(ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: self.system_prompt(),
                },
                ChatMessage {
                    role: "user",
                    content: serde_json::to_string(texts)?,
                },
            ],
            temperature: 0.0,
            stream: false,
        })
    }

    /// 解析消息内容；失败时回退为原文
    pub fn parse_content(&self, content: &str, texts: &[String]) -> Vec<String> {
        let cleaned = self.fence.replace_all(content, "");

        match serde_json::from_str::<Vec<String>>(cleaned.trim()) {
            Ok(translations) if translations.len() == texts.len() => translations,
            Ok(translations) => {
                tracing::warn!(
                    "译文数量不匹配: 期望 {}，得到 {}，回退为原文",
                    texts.len(),
                    translations.len()
                );
                texts.to_vec()
            }
            Err(e) => {
                tracing::warn!("译文不是有效的JSON字符串数组，回退为原文: {}", e);
                texts.to_vec()
            }
        }
    }

    fn interpret_body(
        &self,
        status: reqwest::StatusCode,
        body: &str,
        texts: &[String],
    ) -> TranslationResult<Vec<String>> {
        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) if status.is_success() => {
                tracing::warn!("响应体不是有效JSON，回退为原文: {}", e);
                return Ok(texts.to_vec());
            }
            Err(_) => {
                return Err(TranslationError::NetworkError(format!(
                    "HTTP {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                )))
            }
        };

        if let Some(error) = value.get("error").filter(|error| !error.is_null()) {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| error.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(TranslationError::TranslationServiceError(message));
        }

        if !status.is_success() {
            return Err(TranslationError::NetworkError(format!("HTTP {}", status)));
        }

        match value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
        {
            Some(content) => Ok(self.parse_content(content, texts)),
            None => {
                tracing::warn!("响应中缺少消息内容，回退为原文");
                Ok(texts.to_vec())
            }
        }
    }
}

#[async_trait]
impl Translator for ChatTranslator {
    async fn translate(&self, texts: &[String]) -> TranslationResult<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let credential = self
            .settings
            .get(SettingKey::Credential)
            .await?
            .ok_or_else(|| TranslationError::ConfigError("未配置 API Key".to_string()))?;
        let model = self
            .settings
            .get(SettingKey::Model)
            .await?
            .unwrap_or_else(|| self.default_model.clone());

        let request = self.build_request(model, texts)?;
        tracing::debug!("发送 {} 条文本到 {}", texts.len(), self.api_url);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", credential))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        self.interpret_body(status, &body, texts)
    }

    fn name(&self) -> &str {
        "chat-completions"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::backend::settings::MemorySettings;

    fn translator() -> ChatTranslator {
        ChatTranslator::new(
            &TranslationConfig::default(),
            Arc::new(MemorySettings::with_credential("sk-test")),
        )
        .unwrap()
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_prompt_and_request_shape() {
        let translator = translator();
        let request = translator
            .build_request("deepseek-chat".to_string(), &texts(&["Hello"]))
            .unwrap();
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "deepseek-chat");
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(
            json["messages"][0]["content"],
            "Translate to Chinese. Keep technical terms. Return ONLY a JSON array of strings."
        );
        assert_eq!(json["messages"][1]["content"], "[\"Hello\"]");
    }

    #[test]
    fn test_fenced_content_is_parsed() {
        let translator = translator();
        let input = texts(&["Hello", "World"]);

        let content = "```json\n[\"你好\", \"世界\"]\n```";
        assert_eq!(translator.parse_content(content, &input), texts(&["你好", "世界"]));

        let bare = "```\n[\"你好\", \"世界\"]```";
        assert_eq!(translator.parse_content(bare, &input), texts(&["你好", "世界"]));
    }

    #[test]
    fn test_unparseable_content_echoes_input() {
        let translator = translator();
        let input = texts(&["Hello", "World"]);

        assert_eq!(translator.parse_content("sorry, no", &input), input);
        assert_eq!(translator.parse_content("[\"只有一个\"]", &input), input);
        assert_eq!(translator.parse_content("[1, 2]", &input), input);
    }

    #[test]
    fn test_error_field_is_service_error() {
        let translator = translator();
        let result = translator.interpret_body(
            reqwest::StatusCode::OK,
            r#"{"error": {"message": "quota exceeded"}}"#,
            &texts(&["Hello"]),
        );
        match result {
            Err(TranslationError::TranslationServiceError(message)) => {
                assert_eq!(message, "quota exceeded")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_non_json_body() {
        let translator = translator();
        let input = texts(&["Hello"]);

        let echoed = translator
            .interpret_body(reqwest::StatusCode::OK, "<html>oops</html>", &input)
            .unwrap();
        assert_eq!(echoed, input);

        let failed = translator.interpret_body(
            reqwest::StatusCode::BAD_GATEWAY,
            "<html>bad gateway</html>",
            &input,
        );
        assert!(matches!(failed, Err(TranslationError::NetworkError(_))));
    }

    #[tokio::test]
    async fn test_missing_credential_is_config_error() {
        let translator = ChatTranslator::new(
            &TranslationConfig::default(),
            Arc::new(MemorySettings::new()),
        )
        .unwrap();

        let result = translator.translate(&texts(&["Hello"])).await;
        assert!(matches!(result, Err(TranslationError::ConfigError(_))));
    }
}
