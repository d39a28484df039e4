use markup5ever_rcdom::Handle;

/// 修改来源
///
/// 翻译管道自身写入的修改标记为 `Pipeline`，观察者据此过滤，避免反馈循环。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOrigin {
    Host,
    Pipeline,
}

/// 修改类型
#[derive(Clone)]
pub enum MutationKind {
    /// 子节点列表变化
    ChildList {
        added: Vec<Handle>,
        removed: Vec<Handle>,
    },
    /// 文本节点内容被改写
    CharacterData { old_value: String },
}

/// 单条修改记录
#[derive(Clone)]
pub struct MutationRecord {
    pub kind: MutationKind,
    /// 子节点变化时为父节点，字符数据变化时为文本节点本身
    pub target: Handle,
    pub origin: MutationOrigin,
}

impl MutationRecord {
    pub fn child_list(
        target: Handle,
        added: Vec<Handle>,
        removed: Vec<Handle>,
        origin: MutationOrigin,
    ) -> Self {
        Self {
            kind: MutationKind::ChildList { added, removed },
            target,
            origin,
        }
    }

    pub fn character_data(target: Handle, old_value: String, origin: MutationOrigin) -> Self {
        Self {
            kind: MutationKind::CharacterData { old_value },
            target,
            origin,
        }
    }

    pub fn is_from_pipeline(&self) -> bool {
        self.origin == MutationOrigin::Pipeline
    }

    /// 本记录新增的节点
    pub fn added_nodes(&self) -> &[Handle] {
        match &self.kind {
            MutationKind::ChildList { added, .. } => added,
            MutationKind::CharacterData { .. } => &[],
        }
    }
}

impl std::fmt::Debug for MutationRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.kind {
            MutationKind::ChildList { added, removed } => {
                format!("ChildList(+{}, -{})", added.len(), removed.len())
            }
            MutationKind::CharacterData { old_value } => format!("CharacterData({:?})", old_value),
        };
        f.debug_struct("MutationRecord")
            .field("kind", &kind)
            .field("origin", &self.origin)
            .finish()
    }
}
