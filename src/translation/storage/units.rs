//! 文本单元侧表
//!
//! 按节点身份记录每个文本单元的 `backup_original`（被清空前的原文）与
//! `pending_text`（在途批次捕获的文本），不向宿主节点附加任何字段。

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use markup5ever_rcdom::{Handle, Node};

use crate::parsers::html::node_key;

/// 单元状态
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnitState {
    pub backup_original: Option<String>,
    pub pending_text: Option<String>,
}

struct UnitEntry {
    node: Weak<Node>,
    state: UnitState,
}

impl UnitEntry {
    fn refers_to(&self, node: &Handle) -> bool {
        self.node
            .upgrade()
            .is_some_and(|live| Rc::ptr_eq(&live, node))
    }
}

/// 文本单元侧表
#[derive(Default)]
pub struct UnitTable {
    entries: RefCell<HashMap<usize, UnitEntry>>,
}

impl UnitTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取单元状态；节点已被释放（地址被复用）的旧条目视为不存在
    pub fn state(&self, node: &Handle) -> Option<UnitState> {
        self.entries
            .borrow()
            .get(&node_key(node))
            .filter(|entry| entry.refers_to(node))
            .map(|entry| entry.state.clone())
    }

    pub fn backup_original(&self, node: &Handle) -> Option<String> {
        self.state(node).and_then(|state| state.backup_original)
    }

    pub fn pending_text(&self, node: &Handle) -> Option<String> {
        self.state(node).and_then(|state| state.pending_text)
    }

    pub fn set_backup_original(&self, node: &Handle, text: String) {
        self.update(node, |state| state.backup_original = Some(text));
    }

    pub fn set_pending_text(&self, node: &Handle, text: String) {
        self.update(node, |state| state.pending_text = Some(text));
    }

    pub fn clear_pending_text(&self, node: &Handle) {
        let mut entries = self.entries.borrow_mut();
        if let Some(entry) = entries.get_mut(&node_key(node)) {
            if entry.refers_to(node) {
                entry.state.pending_text = None;
            }
        }
    }

    fn update<F>(&self, node: &Handle, apply: F)
    where
        F: FnOnce(&mut UnitState),
    {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.entry(node_key(node)).or_insert_with(|| UnitEntry {
            node: Rc::downgrade(node),
            state: UnitState::default(),
        });

        if !entry.refers_to(node) {
            entry.node = Rc::downgrade(node);
            entry.state = UnitState::default();
        }

        apply(&mut entry.state);
    }

    /// 移除节点已被释放的条目，返回移除数量
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|_, entry| entry.node.strong_count() > 0);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}
