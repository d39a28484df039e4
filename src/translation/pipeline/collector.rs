//! 文本收集器模块
//!
//! `TreeScanner` 按文档顺序遍历子树，把可翻译的文本节点放入 `PendingSet`。
//! 待处理集合按节点身份去重，因此重复扫描同一子树是幂等的。

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use markup5ever_rcdom::{Handle, NodeData};

use super::filters::{Eligibility, RejectReason, TextFilter};
use crate::parsers::html::node_key;

/// 待处理集合
///
/// 保持插入顺序；同一节点只能出现一次，内容相同的不同节点可以共存。
#[derive(Default)]
pub struct PendingSet {
    inner: RefCell<PendingInner>,
}

#[derive(Default)]
struct PendingInner {
    order: Vec<Handle>,
    keys: HashSet<usize>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入节点；已存在时返回 false
    pub fn insert(&self, node: &Handle) -> bool {
        let mut inner = self.inner.borrow_mut();
        if !inner.keys.insert(node_key(node)) {
            return false;
        }
        inner.order.push(node.clone());
        true
    }

    pub fn contains(&self, node: &Handle) -> bool {
        self.inner.borrow().keys.contains(&node_key(node))
    }

    /// 取出全部节点并清空集合
    pub fn take(&self) -> Vec<Handle> {
        let mut inner = self.inner.borrow_mut();
        inner.keys.clear();
        std::mem::take(&mut inner.order)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.keys.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 扫描统计
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub nodes_visited: usize,
    pub text_nodes: usize,
    pub enqueued: usize,
    pub duplicates: usize,
    pub rejected: HashMap<RejectReason, usize>,
}

impl ScanStats {
    pub fn total_rejected(&self) -> usize {
        self.rejected.values().sum()
    }

    pub fn rejected_for(&self, reason: RejectReason) -> usize {
        self.rejected.get(&reason).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 树扫描器
pub struct TreeScanner {
    filter: TextFilter,
    stats: RefCell<ScanStats>,
}

impl TreeScanner {
    pub fn new(filter: TextFilter) -> Self {
        Self {
            filter,
            stats: RefCell::new(ScanStats::default()),
        }
    }

    pub fn filter(&self) -> &TextFilter {
        &self.filter
    }

    /// 扫描子树，返回本次新加入的节点数
    pub fn scan(&self, root: &Handle, pending: &PendingSet) -> usize {
        let mut enqueued = 0;
        let mut stack = vec![root.clone()];

        // 先序遍历，子节点从左到右
        while let Some(node) = stack.pop() {
            self.stats.borrow_mut().nodes_visited += 1;

            match &node.data {
                NodeData::Text { .. } => {
                    if self.offer(&node, pending) {
                        enqueued += 1;
                    }
                }
                _ => {
                    let children = node.children.borrow();
                    stack.extend(children.iter().rev().cloned());
                }
            }
        }

        if enqueued > 0 {
            tracing::debug!("扫描完成，新增 {} 个待翻译节点", enqueued);
        }
        enqueued
    }

    /// 判定单个节点并在可翻译时加入集合
    pub fn offer(&self, node: &Handle, pending: &PendingSet) -> bool {
        let mut stats = self.stats.borrow_mut();
        if matches!(node.data, NodeData::Text { .. }) {
            stats.text_nodes += 1;
        }

        match self.filter.classify(node) {
            Eligibility::Eligible => {
                if pending.insert(node) {
                    stats.enqueued += 1;
                    true
                } else {
                    stats.duplicates += 1;
                    false
                }
            }
            Eligibility::Rejected(reason) => {
                *stats.rejected.entry(reason).or_insert(0) += 1;
                false
            }
        }
    }

    pub fn stats(&self) -> ScanStats {
        self.stats.borrow().clone()
    }

    pub fn reset_stats(&self) {
        self.stats.borrow_mut().reset();
    }
}
