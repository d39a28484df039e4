//! 批次处理模块
//!
//! 将缓存未命中的单元按字符预算切分为批次。相同文本只发送一次，
//! 结果按索引扇出到所有使用该文本的单元。

use std::collections::HashMap;

use markup5ever_rcdom::Handle;

/// 批次中的单元及其捕获的待翻译文本
#[derive(Clone)]
pub struct BatchUnit {
    pub node: Handle,
    pub text: String,
}

impl BatchUnit {
    pub fn new(node: Handle, text: String) -> Self {
        Self { node, text }
    }
}

/// 翻译批次
#[derive(Clone, Default)]
pub struct Batch {
    /// 批次内全部单元，按遇到顺序
    pub units: Vec<BatchUnit>,
    /// 实际发送的去重文本
    pub texts: Vec<String>,
    /// `fan_out[i]` 为使用 `texts[i]` 的单元下标
    pub fan_out: Vec<Vec<usize>>,
    /// 发送文本的字符总数
    pub char_count: usize,
}

impl Batch {
    fn push_group(&mut self, text: String, units: Vec<BatchUnit>) {
        self.char_count += text.chars().count();

        let start = self.units.len();
        let indices = (start..start + units.len()).collect();
        self.units.extend(units);
        self.texts.push(text);
        self.fan_out.push(indices);
    }

    /// 使用第 `text_index` 条文本的单元
    pub fn units_for(&self, text_index: usize) -> impl Iterator<Item = &BatchUnit> {
        self.fan_out
            .get(text_index)
            .into_iter()
            .flatten()
            .filter_map(|&unit_index| self.units.get(unit_index))
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn text_count(&self) -> usize {
        self.texts.len()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("texts", &self.texts)
            .field("fan_out", &self.fan_out)
            .field("char_count", &self.char_count)
            .finish()
    }
}

/// 批次构建器
#[derive(Debug, Clone)]
pub struct BatchBuilder {
    char_limit: usize,
}

impl BatchBuilder {
    pub fn new(char_limit: usize) -> Self {
        Self {
            char_limit: char_limit.max(1),
        }
    }

    pub fn char_limit(&self) -> usize {
        self.char_limit
    }

    /// 构建批次
    ///
    /// 先在整个输入范围内按文本合并重复单元，再按首次出现的顺序累积去重后的文本；
    /// 加入下一条文本会超过预算且当前批次非空时封闭批次。
    /// 字符预算只计算实际发送的去重文本，共享同一文本的其他单元不占预算。
    /// 单条超长文本独占一个批次，不会被丢弃。
    pub fn build(&self, units: Vec<BatchUnit>) -> Vec<Batch> {
        let mut groups: Vec<(String, Vec<BatchUnit>)> = Vec::new();
        let mut group_index: HashMap<String, usize> = HashMap::new();

        for unit in units {
            match group_index.get(&unit.text) {
                Some(&index) => groups[index].1.push(unit),
                None => {
                    group_index.insert(unit.text.clone(), groups.len());
                    groups.push((unit.text.clone(), vec![unit]));
                }
            }
        }

        let mut batches = Vec::new();
        let mut current = Batch::default();

        for (text, units) in groups {
            let len = text.chars().count();
            if !current.is_empty() && current.char_count + len > self.char_limit {
                batches.push(std::mem::take(&mut current));
            }
            current.push_group(text, units);
        }

        if !current.is_empty() {
            batches.push(current);
        }

        tracing::debug!(
            "构建了 {} 个批次，预算 {} 字符",
            batches.len(),
            self.char_limit
        );
        batches
    }
}

impl Default for BatchBuilder {
    fn default() -> Self {
        Self::new(crate::translation::config::constants::BATCH_CHAR_LIMIT)
    }
}
