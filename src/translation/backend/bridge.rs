//! 页面侧与请求侧之间的消息契约
//!
//! 页面侧通过 [`BridgeClient`] 发送 `translate_batch` 请求并等待应答；
//! [`BackgroundWorker`] 按到达顺序把每个请求交给调度器，结果以
//! `{success, data}` / `{success, error}` 的形式返回。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::translation::core::dispatcher::Dispatcher;
use crate::translation::core::engine::TranslationEngine;
use crate::translation::error::{helpers, TranslationError, TranslationResult};

/// 请求消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BridgeRequest {
    TranslateBatch { texts: Vec<String> },
}

/// 应答消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeResponse {
    pub fn ok(data: Vec<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn into_result(self) -> TranslationResult<Vec<String>> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(TranslationError::BatchProcessingError(
                "应答缺少 data 字段".to_string(),
            )),
            (false, _) => Err(TranslationError::BatchProcessingError(
                self.error.unwrap_or_else(|| "未知错误".to_string()),
            )),
        }
    }
}

struct BridgeEnvelope {
    request: BridgeRequest,
    reply: oneshot::Sender<BridgeResponse>,
}

/// 页面侧客户端
#[derive(Clone)]
pub struct BridgeClient {
    sender: mpsc::Sender<BridgeEnvelope>,
}

impl BridgeClient {
    /// 发送原始请求并等待应答
    pub async fn send(&self, request: BridgeRequest) -> TranslationResult<BridgeResponse> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(BridgeEnvelope { request, reply })
            .await
            .map_err(|_| TranslationError::ConcurrencyError("后台工作者已停止".to_string()))?;

        response.await.map_err(|_| {
            TranslationError::ConcurrencyError("后台工作者未应答即退出".to_string())
        })
    }

    /// 翻译一组去重后的文本
    pub async fn translate_batch(&self, texts: Vec<String>) -> TranslationResult<Vec<String>> {
        self.send(BridgeRequest::TranslateBatch { texts })
            .await?
            .into_result()
    }
}

/// 请求侧工作者
pub struct BackgroundWorker {
    engine: Arc<TranslationEngine>,
    dispatcher: Dispatcher,
}

impl BackgroundWorker {
    pub fn new(engine: Arc<TranslationEngine>, dispatcher: Dispatcher) -> Self {
        Self { engine, dispatcher }
    }

    /// 启动工作者任务并返回客户端；必须在 tokio 运行时内调用
    pub fn spawn(self, capacity: usize) -> BridgeClient {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        tokio::spawn(self.run(receiver));
        BridgeClient { sender }
    }

    async fn run(self, mut receiver: mpsc::Receiver<BridgeEnvelope>) {
        while let Some(BridgeEnvelope { request, reply }) = receiver.recv().await {
            match request {
                BridgeRequest::TranslateBatch { texts } => {
                    let engine = Arc::clone(&self.engine);
                    let count = texts.len();
                    let ticket = self
                        .dispatcher
                        .enqueue(async move { engine.translate(&texts).await })
                        .await;

                    tokio::spawn(async move {
                        let outcome = match ticket {
                            Ok(ticket) => ticket.await.and_then(|result| result),
                            Err(e) => Err(e),
                        };

                        let response = match outcome {
                            Ok(data) => {
                                tracing::debug!("批次完成: {} 条文本", count);
                                BridgeResponse::ok(data)
                            }
                            Err(e) => {
                                helpers::log_error(&e);
                                BridgeResponse::failure(e.to_string())
                            }
                        };

                        // 页面侧可能已经放弃等待
                        let _ = reply.send(response);
                    });
                }
            }
        }
        tracing::debug!("后台工作者已退出");
    }
}
