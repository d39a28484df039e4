//! 文本过滤器模块
//!
//! 判断一个文本节点是否应当进入翻译管道。纯判定，不修改任何状态。

use std::collections::HashSet;

use markup5ever_rcdom::{Handle, NodeData};

use crate::parsers::html::{get_next_sibling, get_node_name, get_parent_node, has_class};
use crate::translation::config::TranslationConfig;

/// 拒绝原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// 不是文本节点
    NotText,
    /// 没有父元素
    Detached,
    /// 父元素位于忽略标签集合中
    IgnoredContainer,
    /// 父元素带有已翻译容器的类名
    TranslatedWrapper,
    /// 后面紧跟译文节点且原文已被清空
    AlreadyTranslated,
    /// 有效字符数不足
    TooShort,
    /// 纯数字
    Numeric,
}

/// 判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Rejected(RejectReason),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// 文本过滤器
#[derive(Debug, Clone)]
pub struct TextFilter {
    min_text_chars: usize,
    ignore_tags: HashSet<String>,
    ignore_classes: Vec<String>,
    annotation_tag: String,
    annotation_class: String,
}

impl TextFilter {
    /// 根据配置创建过滤器；译文节点的类名总是被视为忽略类名
    pub fn new(config: &TranslationConfig) -> Self {
        let mut ignore_classes = config.ignore_classes.clone();
        if !ignore_classes.contains(&config.annotation_class) {
            ignore_classes.push(config.annotation_class.clone());
        }

        Self {
            min_text_chars: config.min_text_chars,
            ignore_tags: config
                .ignore_tags
                .iter()
                .map(|tag| tag.to_ascii_lowercase())
                .collect(),
            ignore_classes,
            annotation_tag: config.annotation_tag.clone(),
            annotation_class: config.annotation_class.clone(),
        }
    }

    /// 判定文本节点是否可翻译
    pub fn classify(&self, node: &Handle) -> Eligibility {
        let content = match &node.data {
            NodeData::Text { contents } => contents.borrow().to_string(),
            _ => return Eligibility::Rejected(RejectReason::NotText),
        };

        let parent = match get_parent_node(node) {
            Some(parent) if get_node_name(&parent).is_some() => parent,
            _ => return Eligibility::Rejected(RejectReason::Detached),
        };

        if let Some(tag) = get_node_name(&parent) {
            if self.ignore_tags.contains(&tag.to_ascii_lowercase()) {
                return Eligibility::Rejected(RejectReason::IgnoredContainer);
            }
        }

        if self
            .ignore_classes
            .iter()
            .any(|class_name| has_class(&parent, class_name))
        {
            return Eligibility::Rejected(RejectReason::TranslatedWrapper);
        }

        let trimmed = content.trim();

        // 宿主重新填充后原文不再为空，此时需要再次处理
        if trimmed.is_empty() && self.is_followed_by_annotation(node) {
            return Eligibility::Rejected(RejectReason::AlreadyTranslated);
        }

        match self.check_text(trimmed) {
            Some(reason) => Eligibility::Rejected(reason),
            None => Eligibility::Eligible,
        }
    }

    /// 仅根据内容判断文本是否值得翻译
    pub fn is_translatable_text(&self, text: &str) -> bool {
        self.check_text(text.trim()).is_none()
    }

    fn check_text(&self, trimmed: &str) -> Option<RejectReason> {
        if trimmed.chars().count() < self.min_text_chars {
            return Some(RejectReason::TooShort);
        }

        if trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Some(RejectReason::Numeric);
        }

        None
    }

    /// 节点是否为译文节点
    pub fn is_annotation(&self, node: &Handle) -> bool {
        get_node_name(node).is_some_and(|tag| tag.eq_ignore_ascii_case(&self.annotation_tag))
            && has_class(node, &self.annotation_class)
    }

    /// 节点是否为译文节点或位于译文节点内部
    pub fn is_within_annotation(&self, node: &Handle) -> bool {
        let mut current = Some(node.clone());
        while let Some(candidate) = current {
            if self.is_annotation(&candidate) {
                return true;
            }
            current = get_parent_node(&candidate);
        }
        false
    }

    /// 紧随其后的译文节点
    pub fn annotation_after(&self, node: &Handle) -> Option<Handle> {
        get_next_sibling(node).filter(|sibling| self.is_annotation(sibling))
    }

    pub fn is_followed_by_annotation(&self, node: &Handle) -> bool {
        self.annotation_after(node).is_some()
    }

    pub fn annotation_tag(&self) -> &str {
        &self.annotation_tag
    }

    pub fn annotation_class(&self) -> &str {
        &self.annotation_class
    }
}

impl Default for TextFilter {
    fn default() -> Self {
        Self::new(&TranslationConfig::default())
    }
}
