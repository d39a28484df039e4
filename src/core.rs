use std::rc::Rc;
use std::sync::Arc;

use encoding_rs::Encoding;
use markup5ever_rcdom::RcDom;
use tokio::task::LocalSet;

use crate::document::LiveDocument;
use crate::parsers::html::{get_charset, html_to_dom};
use crate::translation::backend::Translator;
use crate::translation::config::TranslationConfig;
use crate::translation::core::{SessionStats, TranslationSession};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::storage::cache::TranslationCache;

const ANSI_COLOR_RED: &str = "\x1b[31m";
const ANSI_COLOR_RESET: &str = "\x1b[0m";

/// 一次文档翻译的结果
#[derive(Debug, Clone)]
pub struct TranslatedDocument {
    /// 按 `encoding` 编码的 HTML
    pub data: Vec<u8>,
    pub encoding: String,
    pub stats: SessionStats,
}

/// 文档翻译器
///
/// 解析 HTML，在 `<body>`（缺失时为整个文档）上运行一次翻译会话，
/// 等待全部批次完成后序列化结果。缓存在多次调用之间共享。
pub struct DocumentTranslator {
    config: TranslationConfig,
    translator: Arc<dyn Translator>,
    cache: Arc<TranslationCache>,
}

impl DocumentTranslator {
    pub fn new(
        config: TranslationConfig,
        translator: Arc<dyn Translator>,
        cache: Arc<TranslationCache>,
    ) -> Self {
        Self {
            config,
            translator,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    /// 翻译一份 HTML 文档
    ///
    /// # 参数
    ///
    /// * `input_data` - 原始 HTML 字节
    /// * `input_encoding` - 输入编码；为空时使用 UTF-8，文档内声明了有效字符集时以声明为准
    pub async fn translate(
        &self,
        input_data: &[u8],
        input_encoding: Option<&str>,
    ) -> TranslationResult<TranslatedDocument> {
        EncodingValidator::new().validate(input_encoding)?;
        let (dom, encoding) = EncodingProcessor::new().process_encoding(input_data, input_encoding)?;

        let document = Rc::new(LiveDocument::new(dom));
        let root = document.body().unwrap_or_else(|| document.document());

        let local = LocalSet::new();
        let stats = local
            .run_until(async {
                let session = TranslationSession::with_translator(
                    Rc::clone(&document),
                    root,
                    &self.config,
                    Arc::clone(&self.cache),
                    Arc::clone(&self.translator),
                );
                session.start();
                session.wait_idle().await;
                session.stop();
                session.stats()
            })
            .await;

        tracing::info!(
            "文档翻译完成: {} 个批次，{} 次缓存命中，{} 个批次失败",
            stats.batches_sent,
            stats.cache_hits,
            stats.batches_failed
        );

        let data = document.serialize(&encoding)?;
        Ok(TranslatedDocument {
            data,
            encoding,
            stats,
        })
    }
}

/// 翻译 HTML 文档并返回序列化结果
pub async fn translate_html(
    input_data: &[u8],
    input_encoding: Option<&str>,
    config: TranslationConfig,
    translator: Arc<dyn Translator>,
    cache: Arc<TranslationCache>,
) -> TranslationResult<Vec<u8>> {
    let translator = DocumentTranslator::new(config, translator, cache);
    Ok(translator.translate(input_data, input_encoding).await?.data)
}

/// 编码验证器
pub struct EncodingValidator;

impl EncodingValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, encoding: Option<&str>) -> TranslationResult<()> {
        if let Some(encoding) = encoding {
            if Encoding::for_label_no_replacement(encoding.as_bytes()).is_none() {
                return Err(TranslationError::InvalidInput(format!(
                    "unknown encoding \"{}\"",
                    encoding
                )));
            }
        }
        Ok(())
    }
}

impl Default for EncodingValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// 编码处理器
pub struct EncodingProcessor;

impl EncodingProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn process_encoding(
        &self,
        input_data: &[u8],
        input_encoding: Option<&str>,
    ) -> TranslationResult<(RcDom, String)> {
        let mut document_encoding = input_encoding.unwrap_or("utf-8").to_string();

        // 初始解析
        let mut dom = html_to_dom(input_data, &document_encoding)?;

        // 文档内声明的有效字符集优先
        if let Some(html_charset) = get_charset(&dom.document) {
            if let Some(charset) = Encoding::for_label_no_replacement(html_charset.as_bytes()) {
                if !charset.name().eq_ignore_ascii_case(&document_encoding) {
                    document_encoding = charset.name().to_string();
                    dom = html_to_dom(input_data, &document_encoding)?;
                }
            }
        }

        Ok((dom, document_encoding))
    }
}

impl Default for EncodingProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Prints an error message to stderr
pub fn print_error_message(msg: &str) {
    eprintln!("{ANSI_COLOR_RED}{msg}{ANSI_COLOR_RESET}");
}

/// Prints an info message to stdout
pub fn print_info_message(msg: &str) {
    println!("{msg}");
}
