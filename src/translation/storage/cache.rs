//! 翻译缓存模块
//!
//! 以去除首尾空白后的原文为键，译文为值。键按内容寻址，与节点无关：
//! 文档中任何位置出现的相同文本共享同一条目。
//!
//! 默认不淘汰（生命周期等同于会话）；配置 `max_entries` 后按 LRU 淘汰。

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::translation::error::{TranslationError, TranslationResult};

/// 缓存统计信息
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_entries: usize,
    pub evictions: u64,
}

impl CacheStats {
    /// 计算缓存命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }
}

/// 持久化格式的缓存条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub original: String,
    pub translation: String,
}

/// 翻译缓存
pub struct TranslationCache {
    entries: Mutex<LruCache<String, String>>,
    requests: AtomicU64,
    hits: AtomicU64,
    evictions: AtomicU64,
}

impl TranslationCache {
    /// 创建不限容量的缓存
    pub fn new() -> Self {
        Self::from_lru(LruCache::unbounded())
    }

    /// 创建按 LRU 淘汰的有界缓存；`max_entries` 为 0 时退化为不限容量
    pub fn with_capacity(max_entries: usize) -> Self {
        match NonZeroUsize::new(max_entries) {
            Some(capacity) => Self::from_lru(LruCache::new(capacity)),
            None => Self::new(),
        }
    }

    /// 根据配置创建缓存
    pub fn from_config(max_entries: Option<usize>) -> Self {
        match max_entries {
            Some(max_entries) => Self::with_capacity(max_entries),
            None => Self::new(),
        }
    }

    fn from_lru(entries: LruCache<String, String>) -> Self {
        Self {
            entries: Mutex::new(entries),
            requests: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, String>> {
        // 持锁期间不会执行用户代码，中毒状态下的数据依然完整
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 查询译文
    pub fn get(&self, text: &str) -> Option<String> {
        self.requests.fetch_add(1, Ordering::Relaxed);

        let found = self.lock().get(text.trim()).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// 写入译文；原文或译文为空白时忽略
    pub fn set(&self, text: &str, translation: &str) {
        let key = text.trim().to_string();
        if key.is_empty() || translation.trim().is_empty() {
            return;
        }

        let evicted = self.lock().push(key.clone(), translation.to_string());
        if let Some((evicted_key, _)) = evicted {
            if evicted_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("缓存淘汰: {}", evicted_key);
            }
        }
    }

    /// 是否包含指定原文（不影响统计与最近使用顺序）
    pub fn contains(&self, text: &str) -> bool {
        self.lock().contains(text.trim())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清空缓存
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// 获取统计信息
    pub fn stats(&self) -> CacheStats {
        let requests = self.requests.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);

        CacheStats {
            total_requests: requests,
            cache_hits: hits,
            cache_misses: requests.saturating_sub(hits),
            total_entries: self.len(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// 获取缓存命中率
    pub fn hit_rate(&self) -> f64 {
        self.stats().hit_rate()
    }

    /// 导出全部条目，按最久未使用到最近使用排列
    pub fn export_entries(&self) -> Vec<CacheEntry> {
        let entries = self.lock();
        let mut exported: Vec<CacheEntry> = entries
            .iter()
            .map(|(original, translation)| CacheEntry {
                original: original.clone(),
                translation: translation.clone(),
            })
            .collect();
        exported.reverse();
        exported
    }

    /// 导入条目，返回导入数量
    pub fn import_entries(&self, entries: Vec<CacheEntry>) -> usize {
        let mut imported = 0;
        for entry in entries {
            if entry.original.trim().is_empty() || entry.translation.trim().is_empty() {
                continue;
            }
            self.set(&entry.original, &entry.translation);
            imported += 1;
        }
        imported
    }

    /// 从 JSON 文件加载条目；文件不存在时返回 0
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> TranslationResult<usize> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(0);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            TranslationError::CacheError(format!("读取缓存文件 {} 失败: {}", path.display(), e))
        })?;
        let entries: Vec<CacheEntry> = serde_json::from_str(&content).map_err(|e| {
            TranslationError::CacheError(format!("解析缓存文件 {} 失败: {}", path.display(), e))
        })?;

        let imported = self.import_entries(entries);
        tracing::info!("从 {} 加载了 {} 条缓存", path.display(), imported);
        Ok(imported)
    }

    /// 将全部条目写入 JSON 文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> TranslationResult<usize> {
        let path = path.as_ref();
        let entries = self.export_entries();
        let content = serde_json::to_string_pretty(&entries)?;

        std::fs::write(path, content).map_err(|e| {
            TranslationError::CacheError(format!("写入缓存文件 {} 失败: {}", path.display(), e))
        })?;

        tracing::info!("已保存 {} 条缓存到 {}", entries.len(), path.display());
        Ok(entries.len())
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_trimmed_source_text() {
        let cache = TranslationCache::new();
        cache.set("  Hello world \n", "你好世界");

        assert_eq!(cache.get("Hello world"), Some("你好世界".to_string()));
        assert_eq!(cache.get("\tHello world"), Some("你好世界".to_string()));
        assert!(cache.contains("Hello world"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_blank_translations_are_not_stored() {
        let cache = TranslationCache::new();
        cache.set("Hello world", "");
        cache.set("Goodbye", "  \n");

        assert!(cache.is_empty());
        assert_eq!(cache.get("Hello world"), None);

        let imported = cache.import_entries(vec![
            CacheEntry {
                original: "Hello world".to_string(),
                translation: String::new(),
            },
            CacheEntry {
                original: "Goodbye".to_string(),
                translation: "再见".to_string(),
            },
        ]);
        assert_eq!(imported, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stats_and_hit_rate() {
        let cache = TranslationCache::new();
        cache.set("one", "一");

        assert!(cache.get("one").is_some());
        assert!(cache.get("two").is_none());

        let stats = cache.stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(cache.hit_rate(), 0.5);
    }

    #[test]
    fn test_unbounded_by_default() {
        let cache = TranslationCache::default();
        for i in 0..2000 {
            cache.set(&format!("text {}", i), "译文");
        }
        assert_eq!(cache.len(), 2000);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_bounded_cache_evicts_least_recent() {
        let cache = TranslationCache::with_capacity(2);
        cache.set("a1", "A");
        cache.set("b1", "B");
        assert!(cache.get("a1").is_some());
        cache.set("c1", "C");

        assert!(cache.contains("a1"));
        assert!(!cache.contains("b1"));
        assert!(cache.contains("c1"));
        assert_eq!(cache.stats().evictions, 1);

        // 覆盖已有键不算淘汰
        cache.set("c1", "C2");
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_empty_key_ignored() {
        let cache = TranslationCache::new();
        cache.set("   ", "x");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_persist_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = TranslationCache::new();
        cache.set("Hello", "你好");
        cache.set("World", "世界");
        assert_eq!(cache.save_to_file(&path).unwrap(), 2);

        let restored = TranslationCache::new();
        assert_eq!(restored.load_from_file(&path).unwrap(), 2);
        assert_eq!(restored.get("World"), Some("世界".to_string()));
        assert_eq!(
            restored.export_entries()[0],
            CacheEntry {
                original: "Hello".to_string(),
                translation: "你好".to_string()
            }
        );

        let missing = dir.path().join("missing.json");
        assert_eq!(restored.load_from_file(missing).unwrap(), 0);
    }
}
