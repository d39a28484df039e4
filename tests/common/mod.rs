// 集成测试公共模块
//
// 提供可编程的模拟后端、测试环境和 DOM 辅助函数

use std::future::Future;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use markup5ever_rcdom::Handle;
use tokio::task::LocalSet;

use livetrans::document::LiveDocument;
use livetrans::parsers::html::{collect_text, get_next_sibling, get_node_attr, has_class};
use livetrans::translation::backend::Translator;
use livetrans::translation::config::{constants, TranslationConfig};
use livetrans::translation::core::TranslationSession;
use livetrans::translation::error::{TranslationError, TranslationResult};
use livetrans::translation::storage::cache::TranslationCache;

/// 模拟翻译结果
pub fn fake_translation(text: &str) -> String {
    format!("[zh] {}", text)
}

/// 可编程的模拟后端
///
/// 记录每次调用的输入，统计同时在途的调用数，并可按输入内容失败、
/// 返回错误数量或 panic。
#[derive(Default)]
pub struct MockTranslator {
    calls: Mutex<Vec<Vec<String>>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    delay: Duration,
    fail_on: Option<String>,
    panic_on: Option<String>,
    fixed: Option<Vec<(String, String)>>,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次调用耗时 `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 批次中含有 `text` 时返回服务错误
    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }

    /// 批次中含有 `text` 时 panic
    pub fn panicking_on(mut self, text: &str) -> Self {
        self.panic_on = Some(text.to_string());
        self
    }

    /// 使用固定译文表，表中没有的文本原样返回
    pub fn with_fixed(mut self, pairs: &[(&str, &str)]) -> Self {
        self.fixed = Some(
            pairs
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        );
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// 所有调用中发送的文本（按调用顺序展开）
    pub fn texts_sent(&self) -> Vec<String> {
        self.calls().into_iter().flatten().collect()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn translate_one(&self, text: &str) -> String {
        match &self.fixed {
            Some(pairs) => pairs
                .iter()
                .find(|(from, _)| from == text)
                .map(|(_, to)| to.clone())
                .unwrap_or_else(|| text.to_string()),
            None => fake_translation(text),
        }
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, texts: &[String]) -> TranslationResult<Vec<String>> {
        self.calls.lock().unwrap().push(texts.to_vec());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(marker) = &self.panic_on {
            if texts.iter().any(|text| text == marker) {
                panic!("mock backend exploded on {:?}", marker);
            }
        }

        if let Some(marker) = &self.fail_on {
            if texts.iter().any(|text| text == marker) {
                return Err(TranslationError::TranslationServiceError(format!(
                    "rejected {:?}",
                    marker
                )));
            }
        }

        Ok(texts.iter().map(|text| self.translate_one(text)).collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// 测试配置构建器
pub struct TestConfigBuilder {
    config: TranslationConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: TranslationConfig::default(),
        }
    }

    pub fn batch_char_limit(mut self, limit: usize) -> Self {
        self.config.batch_char_limit = limit;
        self
    }

    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.config.max_concurrent_requests = max;
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.debounce_ms = ms;
        self
    }

    pub fn build(self) -> TranslationConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 测试环境：一份活文档、一个共享缓存和一个模拟后端
pub struct TestEnvironment {
    pub document: Rc<LiveDocument>,
    pub root: Handle,
    pub config: TranslationConfig,
    pub cache: Arc<TranslationCache>,
    pub translator: Arc<MockTranslator>,
}

impl TestEnvironment {
    pub fn new(html: &str) -> Self {
        Self::with_parts(html, TranslationConfig::default(), MockTranslator::new())
    }

    pub fn with_parts(html: &str, config: TranslationConfig, translator: MockTranslator) -> Self {
        let document = Rc::new(LiveDocument::parse(html.as_bytes(), "utf-8").unwrap());
        let root = document.body().unwrap();
        Self {
            document,
            root,
            config,
            cache: Arc::new(TranslationCache::new()),
            translator: Arc::new(translator),
        }
    }

    /// 创建会话；必须在运行时内调用
    pub fn session(&self) -> TranslationSession {
        TranslationSession::with_translator(
            Rc::clone(&self.document),
            self.root.clone(),
            &self.config,
            Arc::clone(&self.cache),
            self.translator.clone(),
        )
    }

    pub fn html(&self) -> String {
        String::from_utf8(self.document.serialize("utf-8").unwrap()).unwrap()
    }

    pub fn annotation_count(&self) -> usize {
        self.html().matches(constants::ANNOTATION_CLASS).count()
    }
}

/// 在 `LocalSet` 内运行页面侧代码
pub async fn run_local<F: Future>(future: F) -> F::Output {
    LocalSet::new().run_until(future).await
}

/// DOM 辅助函数
pub struct HtmlTestHelper;

impl HtmlTestHelper {
    /// 按 id 查找元素
    pub fn by_id(node: &Handle, id: &str) -> Option<Handle> {
        if get_node_attr(node, "id").as_deref() == Some(id) {
            return Some(node.clone());
        }
        node.children
            .borrow()
            .iter()
            .find_map(|child| Self::by_id(child, id))
    }

    /// 元素的第一个子节点（测试页中即为文本单元）
    pub fn first_child(node: &Handle) -> Handle {
        node.children.borrow()[0].clone()
    }

    /// 文本单元后的译文内容
    pub fn annotation_after(unit: &Handle) -> Option<String> {
        get_next_sibling(unit)
            .filter(|next| has_class(next, constants::ANNOTATION_CLASS))
            .map(|next| collect_text(&next))
    }

    pub fn unit_text(document: &LiveDocument, unit: &Handle) -> String {
        document.text_of(unit).unwrap()
    }
}
