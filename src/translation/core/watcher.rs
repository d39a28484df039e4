//! 修改观察
//!
//! 把文档修改记录转换为待处理单元：新增的文本节点直接提交，新增的元素扫描其子树，
//! 文本内容变化时重新提交该文本节点。管道自身写入的修改以及译文节点内部的修改被忽略。

use std::cell::Cell;

use markup5ever_rcdom::{Handle, NodeData};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::document::{LiveDocument, MutationKind, MutationRecord};
use crate::translation::pipeline::collector::{PendingSet, TreeScanner};
use crate::translation::pipeline::filters::TextFilter;

/// 观察统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStats {
    /// 处理过的记录批次数
    pub batches: u64,
    /// 处理过的记录数
    pub records: u64,
    /// 因来源或位置被忽略的记录数
    pub ignored: u64,
    /// 由修改引发的新增待处理单元数
    pub enqueued: u64,
}

pub struct MutationWatcher {
    filter: TextFilter,
    stats: Cell<WatchStats>,
}

impl MutationWatcher {
    pub fn new(filter: TextFilter) -> Self {
        Self {
            filter,
            stats: Cell::new(WatchStats::default()),
        }
    }

    /// 等待下一批记录：阻塞读取一条，再取走通道内已经到达的全部记录
    ///
    /// 通道关闭后返回 `None`。
    pub async fn next_batch(
        receiver: &mut UnboundedReceiver<MutationRecord>,
    ) -> Option<Vec<MutationRecord>> {
        let first = receiver.recv().await?;
        let mut batch = vec![first];
        while let Ok(record) = receiver.try_recv() {
            batch.push(record);
        }
        Some(batch)
    }

    /// 处理一批记录，返回新加入待处理集合的单元数
    pub fn handle_batch(
        &self,
        records: &[MutationRecord],
        document: &LiveDocument,
        scanner: &TreeScanner,
        pending: &PendingSet,
    ) -> usize {
        let mut stats = self.stats.get();
        stats.batches += 1;

        let mut enqueued = 0;
        for record in records {
            stats.records += 1;

            if record.is_from_pipeline() || self.filter.is_within_annotation(&record.target) {
                stats.ignored += 1;
                continue;
            }

            match &record.kind {
                MutationKind::ChildList { added, .. } => {
                    for node in added {
                        enqueued += self.offer_added(node, document, scanner, pending);
                    }
                }
                MutationKind::CharacterData { .. } => {
                    if scanner.offer(&record.target, pending) {
                        enqueued += 1;
                    }
                }
            }
        }

        stats.enqueued += enqueued as u64;
        self.stats.set(stats);

        if enqueued > 0 {
            tracing::debug!("修改记录新增 {} 个待处理单元", enqueued);
        }
        enqueued
    }

    fn offer_added(
        &self,
        node: &Handle,
        document: &LiveDocument,
        scanner: &TreeScanner,
        pending: &PendingSet,
    ) -> usize {
        // 同一批中先插入后移除的节点
        if !document.is_attached(node) {
            return 0;
        }

        match node.data {
            NodeData::Text { .. } => usize::from(scanner.offer(node, pending)),
            NodeData::Element { .. } => {
                if self.filter.is_annotation(node) {
                    0
                } else {
                    scanner.scan(node, pending)
                }
            }
            _ => 0,
        }
    }

    pub fn stats(&self) -> WatchStats {
        self.stats.get()
    }
}
