use std::cell::{Cell, RefCell};
use std::rc::Rc;

use html5ever::interface::{Attribute, QualName};
use html5ever::tendril::format_tendril;
use html5ever::tree_builder::create_element;
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};
use tokio::sync::mpsc;

use super::mutation::{MutationOrigin, MutationRecord};
use crate::parsers::html::{
    find_first_element, get_parent_node, get_text_content, html_to_dom, is_inclusive_descendant,
    serialize_document,
};
use crate::translation::error::{TranslationError, TranslationResult};

/// 观察者标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct Observer {
    id: ObserverId,
    root: Handle,
    sender: mpsc::UnboundedSender<MutationRecord>,
}

/// 活动文档
///
/// 宿主与翻译管道都通过这里修改树结构，每次修改都会生成记录并投递给
/// 覆盖该位置的观察者。文档基于 `Rc`，只能在单线程（`LocalSet`）内使用。
pub struct LiveDocument {
    dom: RcDom,
    observers: RefCell<Vec<Observer>>,
    next_observer_id: Cell<u64>,
}

impl LiveDocument {
    pub fn new(dom: RcDom) -> Self {
        Self {
            dom,
            observers: RefCell::new(Vec::new()),
            next_observer_id: Cell::new(0),
        }
    }

    /// 解析 HTML 字节
    pub fn parse(data: &[u8], document_encoding: &str) -> TranslationResult<Self> {
        Ok(Self::new(html_to_dom(data, document_encoding)?))
    }

    pub fn dom(&self) -> &RcDom {
        &self.dom
    }

    pub fn document(&self) -> Handle {
        self.dom.document.clone()
    }

    pub fn body(&self) -> Option<Handle> {
        find_first_element(&self.dom.document, "body")
    }

    pub fn serialize(&self, document_encoding: &str) -> TranslationResult<Vec<u8>> {
        serialize_document(&self.dom, document_encoding)
    }

    /// 节点是否仍可从文档根到达
    pub fn is_attached(&self, node: &Handle) -> bool {
        is_inclusive_descendant(node, &self.dom.document)
    }

    // ------------------------------------------------------------------
    // 观察者
    // ------------------------------------------------------------------

    /// 观察 `root` 子树内的修改
    pub fn observe(&self, root: &Handle) -> (ObserverId, mpsc::UnboundedReceiver<MutationRecord>) {
        let id = ObserverId(self.next_observer_id.get());
        self.next_observer_id.set(id.0 + 1);

        let (sender, receiver) = mpsc::unbounded_channel();
        self.observers.borrow_mut().push(Observer {
            id,
            root: root.clone(),
            sender,
        });

        (id, receiver)
    }

    /// 断开观察者；接收端随后会在读完已投递的记录后关闭
    pub fn disconnect(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|observer| observer.id != id);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    fn notify(&self, record: MutationRecord) {
        self.observers.borrow_mut().retain(|observer| {
            if is_inclusive_descendant(&record.target, &observer.root) {
                observer.sender.send(record.clone()).is_ok()
            } else {
                !observer.sender.is_closed()
            }
        });
    }

    // ------------------------------------------------------------------
    // 节点创建
    // ------------------------------------------------------------------

    /// 创建一个未挂载的 HTML 元素
    pub fn create_element(&self, tag: &str, attrs: &[(&str, &str)]) -> Handle {
        let attrs = attrs
            .iter()
            .map(|(name, value)| Attribute {
                name: QualName::new(None, ns!(), LocalName::from(*name)),
                value: format_tendril!("{}", value),
            })
            .collect();

        create_element(
            &self.dom,
            QualName::new(None, ns!(html), LocalName::from(tag)),
            attrs,
        )
    }

    /// 创建一个未挂载的文本节点
    pub fn create_text(&self, text: &str) -> Handle {
        Node::new(NodeData::Text {
            contents: RefCell::new(text.into()),
        })
    }

    // ------------------------------------------------------------------
    // 结构修改
    // ------------------------------------------------------------------

    /// 将 `child` 追加为 `parent` 的最后一个子节点
    pub fn append_child(&self, parent: &Handle, child: &Handle, origin: MutationOrigin) {
        self.detach(child, origin);

        parent.children.borrow_mut().push(child.clone());
        child.parent.set(Some(Rc::downgrade(parent)));

        self.notify(MutationRecord::child_list(
            parent.clone(),
            vec![child.clone()],
            Vec::new(),
            origin,
        ));
    }

    /// 将 `node` 插入到 `reference` 之后
    pub fn insert_after(
        &self,
        reference: &Handle,
        node: &Handle,
        origin: MutationOrigin,
    ) -> TranslationResult<()> {
        let parent = get_parent_node(reference).ok_or_else(|| {
            TranslationError::InvalidInput("参考节点没有父节点，无法插入".to_string())
        })?;
        self.detach(node, origin);

        {
            let mut children = parent.children.borrow_mut();
            let index = children
                .iter()
                .position(|child| Rc::ptr_eq(child, reference))
                .ok_or_else(|| {
                    TranslationError::InternalError("父节点的子列表中缺少参考节点".to_string())
                })?;
            children.insert(index + 1, node.clone());
        }
        node.parent.set(Some(Rc::downgrade(&parent)));

        self.notify(MutationRecord::child_list(
            parent,
            vec![node.clone()],
            Vec::new(),
            origin,
        ));
        Ok(())
    }

    /// 从父节点移除；节点未挂载时返回 false
    pub fn remove(&self, node: &Handle, origin: MutationOrigin) -> bool {
        self.detach(node, origin)
    }

    fn detach(&self, node: &Handle, origin: MutationOrigin) -> bool {
        let Some(parent) = get_parent_node(node) else {
            return false;
        };

        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
        node.parent.set(None);

        self.notify(MutationRecord::child_list(
            parent,
            Vec::new(),
            vec![node.clone()],
            origin,
        ));
        true
    }

    // ------------------------------------------------------------------
    // 字符数据
    // ------------------------------------------------------------------

    /// 改写文本节点内容
    pub fn set_text(&self, node: &Handle, text: &str, origin: MutationOrigin) -> TranslationResult<()> {
        let old_value = match &node.data {
            NodeData::Text { contents } => {
                let mut contents = contents.borrow_mut();
                let old_value = contents.to_string();
                *contents = text.into();
                old_value
            }
            _ => {
                return Err(TranslationError::InvalidInput(
                    "只能改写文本节点的内容".to_string(),
                ))
            }
        };

        self.notify(MutationRecord::character_data(node.clone(), old_value, origin));
        Ok(())
    }

    /// 文本节点的当前内容
    pub fn text_of(&self, node: &Handle) -> Option<String> {
        get_text_content(node)
    }
}
