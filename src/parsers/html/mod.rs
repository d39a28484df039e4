//! HTML解析和处理模块
//!
//! - `dom`: 解析与基础DOM操作
//! - `serializer`: 序列化功能

pub mod dom;
pub mod serializer;

// 重新导出主要的公共 API
pub use dom::{
    collect_text, find_first_element, get_charset, get_next_sibling, get_node_attr, get_node_name,
    get_parent_node, get_text_content, has_class, html_to_dom, is_inclusive_descendant, node_key,
};
pub use serializer::serialize_document;
