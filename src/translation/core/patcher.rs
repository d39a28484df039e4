//! DOM 补丁
//!
//! 把译文写入紧随文本单元的译文节点，并清空单元的原文。单元节点本身始终保留，
//! 宿主持有的引用不会失效；宿主重新填充原文后再次应用同一译文只会重新清空原文。

use markup5ever_rcdom::{Handle, NodeData};

use crate::document::{LiveDocument, MutationOrigin};
use crate::parsers::html::collect_text;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::filters::TextFilter;
use crate::translation::storage::units::UnitTable;

/// 补丁结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// 单元已脱离文档，未做任何修改
    Detached,
    /// 新建了译文节点
    Inserted,
    /// 已有译文节点的内容被改写
    Updated,
    /// 已有译文节点内容相同
    Unchanged,
}

pub struct DomPatcher {
    filter: TextFilter,
}

impl DomPatcher {
    pub fn new(filter: TextFilter) -> Self {
        Self { filter }
    }

    /// 将译文应用到文本单元
    pub fn apply(
        &self,
        document: &LiveDocument,
        units: &UnitTable,
        node: &Handle,
        translation: &str,
    ) -> TranslationResult<PatchOutcome> {
        if !document.is_attached(node) {
            return Ok(PatchOutcome::Detached);
        }

        let live = document.text_of(node).ok_or_else(|| {
            TranslationError::InvalidInput("只能对文本节点应用译文".to_string())
        })?;

        if let Some(annotation) = self.filter.annotation_after(node) {
            let outcome = if collect_text(&annotation) != translation {
                self.rewrite_annotation(document, &annotation, translation)?;
                PatchOutcome::Updated
            } else {
                PatchOutcome::Unchanged
            };

            if !live.trim().is_empty() {
                units.set_backup_original(node, live);
                document.set_text(node, "", MutationOrigin::Pipeline)?;
                tracing::trace!("重新清空被宿主填充的原文");
            }

            return Ok(outcome);
        }

        let annotation = document.create_element(
            self.filter.annotation_tag(),
            &[("class", self.filter.annotation_class())],
        );
        let text = document.create_text(translation);
        document.append_child(&annotation, &text, MutationOrigin::Pipeline);

        if !live.trim().is_empty() {
            units.set_backup_original(node, live);
        }
        document.insert_after(node, &annotation, MutationOrigin::Pipeline)?;
        document.set_text(node, "", MutationOrigin::Pipeline)?;

        Ok(PatchOutcome::Inserted)
    }

    fn rewrite_annotation(
        &self,
        document: &LiveDocument,
        annotation: &Handle,
        translation: &str,
    ) -> TranslationResult<()> {
        let children = annotation.children.borrow().clone();
        let mut text_nodes = children
            .iter()
            .filter(|child| matches!(child.data, NodeData::Text { .. }));

        match text_nodes.next() {
            Some(first) => {
                document.set_text(first, translation, MutationOrigin::Pipeline)?;
                for extra in children.iter().filter(|child| !std::rc::Rc::ptr_eq(child, first)) {
                    document.remove(extra, MutationOrigin::Pipeline);
                }
            }
            None => {
                for child in &children {
                    document.remove(child, MutationOrigin::Pipeline);
                }
                let text = document.create_text(translation);
                document.append_child(annotation, &text, MutationOrigin::Pipeline);
            }
        }
        Ok(())
    }
}
