//! 翻译会话
//!
//! `TranslationSession` 把页面侧的各个部件组合成一个持续运行的翻译过程：
//! 启动时对根节点做一次全量扫描并立即处理队列，之后由修改观察驱动增量处理，
//! 多次修改经防抖合并为一次处理。
//!
//! ## 处理流程
//!
//! 1. **解析文本**: 单元的当前内容去空白后非空则使用之，否则回退到备份原文
//! 2. **缓存命中**: 直接应用缓存中的译文，不经过后端
//! 3. **缓存未命中**: 记录捕获文本，按字符预算分批，经消息通道交给请求侧
//! 4. **应用结果**: 每条译文先写入缓存，会话仍处于活动状态时再扇出到所有使用该文本的单元
//!
//! 批次失败只记录日志并丢弃该批单元；这些单元在内容再次变化时会重新进入队列。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use livetrans::translation::core::TranslationSession;
//!
//! let local = tokio::task::LocalSet::new();
//! local
//!     .run_until(async {
//!         let session = TranslationSession::new(document, root, config, cache, bridge);
//!         session.start();
//!         session.wait_idle().await;
//!     })
//!     .await;
//! ```

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use futures::future::join_all;
use markup5ever_rcdom::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use super::dispatcher::{DispatchStats, Dispatcher};
use super::engine::{EngineConfig, TranslationEngine};
use super::patcher::{DomPatcher, PatchOutcome};
use super::watcher::{MutationWatcher, WatchStats};
use crate::document::{LiveDocument, MutationRecord, ObserverId};
use crate::translation::backend::{BackgroundWorker, BridgeClient, Translator};
use crate::translation::config::TranslationConfig;
use crate::translation::error::{helpers, ErrorStats};
use crate::translation::pipeline::batch::{Batch, BatchBuilder, BatchUnit};
use crate::translation::pipeline::collector::{PendingSet, ScanStats, TreeScanner};
use crate::translation::pipeline::debounce::DebounceScheduler;
use crate::translation::pipeline::filters::TextFilter;
use crate::translation::storage::cache::TranslationCache;
use crate::translation::storage::units::UnitTable;

/// 会话统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// 执行过的队列处理次数
    pub passes: u64,
    /// 缓存命中的单元数
    pub cache_hits: u64,
    /// 发出的批次数
    pub batches_sent: u64,
    /// 失败的批次数
    pub batches_failed: u64,
    /// 发送给后端的去重文本数
    pub texts_sent: u64,
    /// 新建译文节点的次数
    pub annotations_inserted: u64,
    /// 改写已有译文节点的次数
    pub annotations_updated: u64,
    /// 应用时已脱离文档而被跳过的单元数
    pub detached_skips: u64,
    /// 既无内容也无备份而被丢弃的单元数
    pub unresolved: u64,
    /// 后端返回空译文而被跳过的文本数
    pub empty_results: u64,
}

/// 翻译会话
///
/// 会话运行在页面侧的单线程上下文中，`start` 与 `wait_idle` 必须在
/// `tokio::task::LocalSet` 内调用。
pub struct TranslationSession {
    inner: Rc<SessionInner>,
}

struct SessionInner {
    document: Rc<LiveDocument>,
    root: Handle,
    cache: Arc<TranslationCache>,
    bridge: BridgeClient,
    dispatcher: Option<Dispatcher>,

    units: UnitTable,
    pending: PendingSet,
    scanner: TreeScanner,
    watcher: MutationWatcher,
    patcher: DomPatcher,
    batcher: BatchBuilder,
    debounce: DebounceScheduler,

    active: Cell<bool>,
    observer: Cell<Option<ObserverId>>,
    watch_task: RefCell<Option<JoinHandle<()>>>,
    batch_tasks: RefCell<Vec<JoinHandle<()>>>,
    stats: RefCell<SessionStats>,
    errors: RefCell<ErrorStats>,
}

impl TranslationSession {
    /// 使用已有的消息通道创建会话
    pub fn new(
        document: Rc<LiveDocument>,
        root: Handle,
        config: &TranslationConfig,
        cache: Arc<TranslationCache>,
        bridge: BridgeClient,
    ) -> Self {
        Self::build(document, root, config, cache, bridge, None)
    }

    /// 创建会话并启动自带的请求侧工作者
    ///
    /// 工作者与调度器运行在 tokio 多任务运行时上，需要在运行时内调用。
    pub fn with_translator(
        document: Rc<LiveDocument>,
        root: Handle,
        config: &TranslationConfig,
        cache: Arc<TranslationCache>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        let engine = Arc::new(TranslationEngine::new(
            translator,
            EngineConfig::from_translation_config(config),
        ));
        let dispatcher = Dispatcher::new(config.max_concurrent_requests, config.queue_capacity);
        let bridge = BackgroundWorker::new(engine, dispatcher.clone()).spawn(config.queue_capacity);

        Self::build(document, root, config, cache, bridge, Some(dispatcher))
    }

    fn build(
        document: Rc<LiveDocument>,
        root: Handle,
        config: &TranslationConfig,
        cache: Arc<TranslationCache>,
        bridge: BridgeClient,
        dispatcher: Option<Dispatcher>,
    ) -> Self {
        let filter = TextFilter::new(config);

        Self {
            inner: Rc::new(SessionInner {
                document,
                root,
                cache,
                bridge,
                dispatcher,
                units: UnitTable::new(),
                pending: PendingSet::new(),
                scanner: TreeScanner::new(filter.clone()),
                watcher: MutationWatcher::new(filter.clone()),
                patcher: DomPatcher::new(filter),
                batcher: BatchBuilder::new(config.batch_char_limit),
                debounce: DebounceScheduler::new(config.debounce()),
                active: Cell::new(false),
                observer: Cell::new(None),
                watch_task: RefCell::new(None),
                batch_tasks: RefCell::new(Vec::new()),
                stats: RefCell::new(SessionStats::default()),
                errors: RefCell::new(ErrorStats::default()),
            }),
        }
    }

    /// 启动会话
    ///
    /// 注册修改观察，扫描根节点并立即处理队列。会话已在运行时不做任何事并返回 `false`。
    pub fn start(&self) -> bool {
        let inner = &self.inner;
        if inner.active.get() {
            tracing::debug!("翻译会话已在运行");
            return false;
        }
        inner.active.set(true);

        let (id, receiver) = inner.document.observe(&inner.root);
        inner.observer.set(Some(id));
        let task = tokio::task::spawn_local(watch(Rc::downgrade(inner), receiver));
        *inner.watch_task.borrow_mut() = Some(task);

        let enqueued = inner.scanner.scan(&inner.root, &inner.pending);
        tracing::info!("翻译会话已启动，初始扫描发现 {} 个文本单元", enqueued);

        SessionInner::process_queue(inner);
        true
    }

    /// 停止会话
    ///
    /// 断开观察并清空队列；已发出的批次仍会写入缓存，但不再修改文档。
    pub fn stop(&self) -> bool {
        let inner = &self.inner;
        if !inner.active.replace(false) {
            return false;
        }

        inner.shutdown();
        inner.pending.clear();
        tracing::info!("翻译会话已停止");
        true
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// 重新扫描根节点并立即处理队列，返回新加入的单元数
    pub fn rescan(&self) -> usize {
        let inner = &self.inner;
        if !inner.active.get() {
            return 0;
        }
        let enqueued = inner.scanner.scan(&inner.root, &inner.pending);
        SessionInner::process_queue(inner);
        enqueued
    }

    /// 等待会话空闲：没有在途批次、没有待触发的防抖处理，且已到达的修改记录都已处理
    pub async fn wait_idle(&self) {
        let inner = &self.inner;
        loop {
            let handles = std::mem::take(&mut *inner.batch_tasks.borrow_mut());
            if !handles.is_empty() {
                for result in join_all(handles).await {
                    if let Err(e) = result {
                        if e.is_panic() {
                            tracing::error!("批次任务异常终止: {}", e);
                        }
                    }
                }
                continue;
            }

            if inner.debounce.is_pending() {
                tokio::time::sleep(inner.debounce.delay()).await;
                continue;
            }

            // 让观察任务处理已投递的记录
            tokio::task::yield_now().await;
            if inner.batch_tasks.borrow().is_empty() && !inner.debounce.is_pending() {
                break;
            }
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.inner.stats.borrow().clone()
    }

    /// 失败批次的错误分类统计
    pub fn error_stats(&self) -> ErrorStats {
        self.inner.errors.borrow().clone()
    }

    pub fn scan_stats(&self) -> ScanStats {
        self.inner.scanner.stats()
    }

    pub fn watch_stats(&self) -> WatchStats {
        self.inner.watcher.stats()
    }

    /// 自带调度器时返回其统计
    pub fn dispatch_stats(&self) -> Option<DispatchStats> {
        self.inner.dispatcher.as_ref().map(Dispatcher::stats)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.inner.cache
    }

    pub fn document(&self) -> &Rc<LiveDocument> {
        &self.inner.document
    }

    pub fn units(&self) -> &UnitTable {
        &self.inner.units
    }
}

impl SessionInner {
    /// 取出待处理集合，命中缓存的直接应用，其余分批发送
    fn process_queue(inner: &Rc<SessionInner>) {
        if !inner.active.get() {
            return;
        }

        let nodes = inner.pending.take();
        if nodes.is_empty() {
            return;
        }
        inner.stats.borrow_mut().passes += 1;

        let mut misses = Vec::new();
        for node in nodes {
            let Some(text) = inner.resolve_text(&node) else {
                inner.stats.borrow_mut().unresolved += 1;
                continue;
            };

            if let Some(translation) = inner.cache.get(&text) {
                inner.stats.borrow_mut().cache_hits += 1;
                inner.apply(&node, &translation);
                continue;
            }

            inner.units.set_pending_text(&node, text.clone());
            misses.push(BatchUnit::new(node, text));
        }

        let batches = inner.batcher.build(misses);
        if batches.is_empty() {
            return;
        }
        tracing::debug!("发出 {} 个翻译批次", batches.len());

        let mut tasks = inner.batch_tasks.borrow_mut();
        tasks.retain(|handle| !handle.is_finished());
        for batch in batches {
            tasks.push(tokio::task::spawn_local(Self::run_batch(
                Rc::clone(inner),
                batch,
            )));
        }
    }

    async fn run_batch(inner: Rc<SessionInner>, batch: Batch) {
        {
            let mut stats = inner.stats.borrow_mut();
            stats.batches_sent += 1;
            stats.texts_sent += batch.text_count() as u64;
        }

        match inner.bridge.translate_batch(batch.texts.clone()).await {
            Ok(translations) => {
                for (index, (text, translation)) in
                    batch.texts.iter().zip(translations.iter()).enumerate()
                {
                    // 空译文既不缓存也不应用，保留原文
                    let usable = !translation.trim().is_empty();
                    if usable {
                        inner.cache.set(text, translation);
                    } else {
                        inner.stats.borrow_mut().empty_results += 1;
                        tracing::debug!("后端返回空译文，保留原文: {}", text);
                    }
                    for unit in batch.units_for(index) {
                        inner.units.clear_pending_text(&unit.node);
                        if usable && inner.active.get() {
                            inner.apply(&unit.node, translation);
                        }
                    }
                }
            }
            Err(e) => {
                inner.stats.borrow_mut().batches_failed += 1;
                inner.errors.borrow_mut().record_error(&e);
                helpers::log_error(&e);
                for unit in &batch.units {
                    inner.units.clear_pending_text(&unit.node);
                }
            }
        }
    }

    /// 当前内容去空白后非空则使用之，否则使用备份原文
    fn resolve_text(&self, node: &Handle) -> Option<String> {
        let live = self.document.text_of(node)?;
        let live = live.trim();
        if !live.is_empty() {
            return Some(live.to_string());
        }

        self.units
            .backup_original(node)
            .map(|backup| backup.trim().to_string())
            .filter(|backup| !backup.is_empty())
    }

    fn apply(&self, node: &Handle, translation: &str) {
        match self
            .patcher
            .apply(&self.document, &self.units, node, translation)
        {
            Ok(outcome) => {
                let mut stats = self.stats.borrow_mut();
                match outcome {
                    PatchOutcome::Inserted => stats.annotations_inserted += 1,
                    PatchOutcome::Updated => stats.annotations_updated += 1,
                    PatchOutcome::Detached => stats.detached_skips += 1,
                    PatchOutcome::Unchanged => {}
                }
            }
            Err(e) => {
                self.errors.borrow_mut().record_error(&e);
                helpers::log_error(&e);
            }
        }
    }

    fn schedule_flush(inner: &Rc<SessionInner>) {
        let weak = Rc::downgrade(inner);
        inner.debounce.trigger(move || {
            if let Some(inner) = weak.upgrade() {
                SessionInner::process_queue(&inner);
            }
        });
    }

    fn shutdown(&self) {
        if let Some(id) = self.observer.take() {
            self.document.disconnect(id);
        }
        if let Some(task) = self.watch_task.borrow_mut().take() {
            task.abort();
        }
        self.debounce.cancel();
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn watch(session: Weak<SessionInner>, mut receiver: UnboundedReceiver<MutationRecord>) {
    while let Some(records) = MutationWatcher::next_batch(&mut receiver).await {
        let Some(inner) = session.upgrade() else {
            break;
        };
        if !inner.active.get() {
            break;
        }

        let enqueued =
            inner
                .watcher
                .handle_batch(&records, &inner.document, &inner.scanner, &inner.pending);
        if enqueued > 0 {
            SessionInner::schedule_flush(&inner);
        }
    }
    tracing::debug!("修改观察任务已退出");
}
