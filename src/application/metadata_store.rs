//! Metadata Store - Flat Store 上的音频元数据视图
//!
//! 键带命名空间前缀，避免与其他设置项冲突；值为 `MetadataRecord` 的 JSON。
//!
//! 两个存储之间没有跨存储事务，分歧在读取时修复（`reconcile`）：
//! - 有 blob、元数据缺失或不一致 → 从 blob 重建元数据
//! - 元数据声称成功、blob 已不存在 → 标记 `succeeded: false` 并清除临时引用

use std::sync::Arc;

use crate::application::ports::{Clock, FlatStorePort};
use crate::domain::{AudioRecord, AudioRef, CacheKey, GenerationState, MetadataRecord};

/// 默认键前缀
pub const DEFAULT_METADATA_PREFIX: &str = "audio_meta:";

pub struct MetadataStore {
    flat_store: Arc<dyn FlatStorePort>,
    prefix: String,
    clock: Arc<dyn Clock>,
}

impl MetadataStore {
    pub fn new(
        flat_store: Arc<dyn FlatStorePort>,
        prefix: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            flat_store,
            prefix: prefix.into(),
            clock,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Flat Store 中实际使用的键
    pub fn storage_key(&self, key: &CacheKey) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// 读取元数据；存储错误或 JSON 无法解析都按不存在处理
    pub fn get(&self, key: &CacheKey) -> Option<MetadataRecord> {
        let storage_key = self.storage_key(key);
        let raw = match self.flat_store.get(&storage_key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key = %storage_key, error = %e, "Failed to read audio metadata");
                return None;
            }
        };

        match serde_json::from_str::<MetadataRecord>(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(key = %storage_key, error = %e, "Unparseable audio metadata, ignoring");
                None
            }
        }
    }

    /// 当前记录的临时引用
    pub fn preview_reference(&self, key: &CacheKey) -> Option<AudioRef> {
        self.get(key).and_then(|record| record.preview_reference)
    }

    /// 写入元数据，失败只记录日志
    pub fn put(&self, record: &MetadataRecord) -> bool {
        let value = match serde_json::to_string(record) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %record.key, error = %e, "Failed to serialize audio metadata");
                return false;
            }
        };

        match self.flat_store.set(&record.key, &value) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key = %record.key, error = %e, "Failed to write audio metadata");
                false
            }
        }
    }

    pub fn remove(&self, key: &CacheKey) -> bool {
        let storage_key = self.storage_key(key);
        match self.flat_store.remove(&storage_key) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key = %storage_key, error = %e, "Failed to remove audio metadata");
                false
            }
        }
    }

    /// 列出命名空间下的所有缓存键
    pub fn list_keys(&self) -> Vec<CacheKey> {
        let keys = match self.flat_store.keys_with_prefix(&self.prefix) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list audio metadata");
                return Vec::new();
            }
        };

        keys.iter()
            .filter_map(|k| k.strip_prefix(self.prefix.as_str()))
            .map(CacheKey::from_normalized)
            .collect()
    }

    /// 列出命名空间下的所有元数据
    pub fn list(&self) -> Vec<MetadataRecord> {
        self.list_keys()
            .iter()
            .filter_map(|k| self.get(k))
            .collect()
    }

    /// 记录生成成功
    pub fn record_success(
        &self,
        key: &CacheKey,
        owner_id: &str,
        sentence: &str,
        filename: &str,
        preview: Option<AudioRef>,
    ) -> bool {
        let record = MetadataRecord::new(
            self.storage_key(key),
            sentence,
            GenerationState::succeeded(),
            self.clock.now(),
        )
        .with_filename(Some(filename.to_string()))
        .with_owner(owner_id)
        .with_preview(preview);

        self.put(&record)
    }

    /// 记录生成失败，保留已有文件名
    pub fn record_failure(&self, key: &CacheKey, owner_id: &str, sentence: &str) -> bool {
        let filename = self.get(key).and_then(|r| r.filename);
        let record = MetadataRecord::new(
            self.storage_key(key),
            sentence,
            GenerationState::failed(),
            self.clock.now(),
        )
        .with_filename(filename)
        .with_owner(owner_id);

        self.put(&record)
    }

    /// 读取时修复两个存储之间的分歧
    ///
    /// `blob` 为 Blob Store 中同一键的记录，`preview` 为本次会话新建的临时引用
    /// （旧引用一律被替换）。返回修复后的元数据。
    pub fn reconcile(
        &self,
        key: &CacheKey,
        blob: Option<&AudioRecord>,
        preview: Option<AudioRef>,
    ) -> Option<MetadataRecord> {
        let existing = self.get(key);

        let repaired = match (blob, existing) {
            (Some(record), None) => {
                tracing::debug!(key = %key, "Rebuilding missing metadata from cached audio");
                MetadataRecord::new(
                    self.storage_key(key),
                    record.source_text.clone(),
                    GenerationState::succeeded(),
                    self.clock.now(),
                )
                .with_filename(record.payload.filename().map(str::to_string))
                .with_owner(record.origin_id.clone())
                .with_preview(preview)
            }
            (Some(record), Some(meta)) => {
                let filename = meta
                    .filename
                    .clone()
                    .or_else(|| record.payload.filename().map(str::to_string));
                if meta.generation_state.succeeded
                    && meta.filename == filename
                    && meta.preview_reference == preview
                {
                    return Some(meta);
                }
                if !meta.generation_state.succeeded {
                    tracing::debug!(key = %key, "Metadata disagrees with cached audio, marking succeeded");
                }
                MetadataRecord {
                    filename,
                    generation_state: GenerationState::succeeded(),
                    preview_reference: preview,
                    ..meta
                }
            }
            (None, Some(meta)) => {
                if !meta.generation_state.succeeded && meta.preview_reference.is_none() {
                    return Some(meta);
                }
                if meta.generation_state.succeeded {
                    tracing::debug!(key = %key, "Cached audio is gone, marking metadata as not succeeded");
                }
                MetadataRecord {
                    generation_state: GenerationState {
                        attempted: meta.generation_state.attempted,
                        succeeded: false,
                    },
                    preview_reference: None,
                    ..meta
                }
            }
            (None, None) => return None,
        };

        self.put(&repaired);
        Some(repaired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AudioPayload;
    use crate::infrastructure::memory::SystemClock;
    use crate::infrastructure::persistence::flat::InMemoryFlatStore;
    use chrono::Utc;
    use uuid::Uuid;

    fn store() -> (MetadataStore, Arc<InMemoryFlatStore>) {
        let flat = Arc::new(InMemoryFlatStore::new());
        let store = MetadataStore::new(flat.clone(), DEFAULT_METADATA_PREFIX, Arc::new(SystemClock));
        (store, flat)
    }

    fn blob(key: &CacheKey) -> AudioRecord {
        AudioRecord::new(
            key.clone(),
            "read",
            "I read books.",
            AudioPayload::from_generated(vec![1, 2, 3], "read_example_nova.mp3"),
            Utc::now(),
        )
    }

    fn preview() -> AudioRef {
        AudioRef {
            session_id: Uuid::new_v4(),
            token: Uuid::new_v4(),
            url: "http://localhost/preview".to_string(),
        }
    }

    #[test]
    fn test_keys_are_namespaced() {
        let (store, flat) = store();
        let key = CacheKey::from_normalized("i read books.");
        store.record_success(&key, "read", "I read books.", "read_example_nova.mp3", None);

        assert!(flat.get("audio_meta:i read books.").unwrap().is_some());
        assert!(flat.get("i read books.").unwrap().is_none());
    }

    #[test]
    fn test_metadata_survives_without_preview() {
        let (store, _) = store();
        let key = CacheKey::from_normalized("i read books.");
        store.record_success(&key, "read", "I read books.", "read_example_nova.mp3", Some(preview()));

        let record = store.get(&key).unwrap();
        assert_eq!(record.filename.as_deref(), Some("read_example_nova.mp3"));
        assert_eq!(record.generation_state, GenerationState::succeeded());
        assert_eq!(record.owner_id.as_deref(), Some("read"));
    }

    #[test]
    fn test_unparseable_value_is_absent() {
        let (store, flat) = store();
        let key = CacheKey::from_normalized("broken");
        flat.set(&store.storage_key(&key), "not json").unwrap();
        assert!(store.get(&key).is_none());
    }

    #[test]
    fn test_failure_keeps_previous_filename() {
        let (store, _) = store();
        let key = CacheKey::from_normalized("i read books.");
        store.record_success(&key, "read", "I read books.", "read_example_nova.mp3", None);
        store.record_failure(&key, "read", "I read books.");

        let record = store.get(&key).unwrap();
        assert_eq!(record.generation_state, GenerationState::failed());
        assert_eq!(record.filename.as_deref(), Some("read_example_nova.mp3"));
    }

    #[test]
    fn test_reconcile_rebuilds_missing_metadata() {
        let (store, _) = store();
        let key = CacheKey::from_normalized("i read books.");
        let record = blob(&key);
        let fresh = preview();

        let repaired = store.reconcile(&key, Some(&record), Some(fresh.clone())).unwrap();
        assert!(repaired.generation_state.succeeded);
        assert_eq!(repaired.filename.as_deref(), Some("read_example_nova.mp3"));
        assert_eq!(repaired.preview_reference, Some(fresh));
        assert_eq!(store.get(&key), Some(repaired));
    }

    #[test]
    fn test_reconcile_marks_vanished_blob() {
        let (store, _) = store();
        let key = CacheKey::from_normalized("i read books.");
        store.record_success(&key, "read", "I read books.", "read_example_nova.mp3", Some(preview()));

        let repaired = store.reconcile(&key, None, None).unwrap();
        assert_eq!(repaired.generation_state, GenerationState::failed());
        assert!(repaired.preview_reference.is_none());
        assert_eq!(repaired.filename.as_deref(), Some("read_example_nova.mp3"));
    }

    #[test]
    fn test_reconcile_replaces_stale_preview() {
        let (store, _) = store();
        let key = CacheKey::from_normalized("i read books.");
        store.record_success(&key, "read", "I read books.", "read_example_nova.mp3", Some(preview()));

        let fresh = preview();
        let record = blob(&key);
        let repaired = store.reconcile(&key, Some(&record), Some(fresh.clone())).unwrap();
        assert_eq!(repaired.preview_reference, Some(fresh));
    }

    #[test]
    fn test_reconcile_nothing_known() {
        let (store, _) = store();
        assert!(store.reconcile(&CacheKey::from_normalized("x"), None, None).is_none());
    }

    #[test]
    fn test_list() {
        let (store, flat) = store();
        flat.set("openai_api_key", "sk-unrelated").unwrap();
        store.record_success(&CacheKey::from_normalized("a."), "a", "A.", "a.mp3", None);
        store.record_success(&CacheKey::from_normalized("b."), "b", "B.", "b.mp3", None);
        assert_eq!(store.list().len(), 2);
    }
}
