//! Maintenance Handlers - 删除与清理
//!
//! Blob Store 的删除同时清除对应的元数据

use std::sync::Arc;

use crate::application::commands::{DeleteAudio, DeleteOwnerAudio, SweepAudio};
use crate::application::error::ApplicationError;
use crate::application::metadata_store::MetadataStore;
use crate::application::ports::BlobStorePort;
use crate::domain::{derive_key, CacheKey};

// ============================================================================
// DeleteAudio
// ============================================================================

/// DeleteAudio Handler
pub struct DeleteAudioHandler {
    blob_store: Arc<dyn BlobStorePort>,
    metadata: Arc<MetadataStore>,
}

impl DeleteAudioHandler {
    pub fn new(blob_store: Arc<dyn BlobStorePort>, metadata: Arc<MetadataStore>) -> Self {
        Self {
            blob_store,
            metadata,
        }
    }

    /// 删除单条例句音频，条目不存在也视为成功
    pub async fn handle(&self, command: DeleteAudio) -> Result<CacheKey, ApplicationError> {
        let key = derive_key(&command.sentence, &command.owner_id);

        if !self.blob_store.delete(&command.owner_id, &command.sentence).await {
            return Err(ApplicationError::storage("delete", &key));
        }
        self.metadata.remove(&key);

        tracing::info!(key = %key, owner_id = %command.owner_id, "Audio deleted");
        Ok(key)
    }
}

// ============================================================================
// DeleteOwnerAudio
// ============================================================================

/// DeleteOwnerAudio Handler
pub struct DeleteOwnerAudioHandler {
    blob_store: Arc<dyn BlobStorePort>,
    metadata: Arc<MetadataStore>,
}

impl DeleteOwnerAudioHandler {
    pub fn new(blob_store: Arc<dyn BlobStorePort>, metadata: Arc<MetadataStore>) -> Self {
        Self {
            blob_store,
            metadata,
        }
    }

    /// 删除某个单词/卡片的全部音频，返回删除的条目数
    pub async fn handle(&self, command: DeleteOwnerAudio) -> Result<usize, ApplicationError> {
        let owner_id = command.owner_id.trim();
        if owner_id.is_empty() {
            return Err(ApplicationError::validation("owner_id is required"));
        }

        let keys = self.blob_store.keys_by_origin(owner_id).await;
        if !self.blob_store.delete_by_origin(owner_id).await {
            return Err(ApplicationError::StorageError(format!(
                "failed to delete audio for owner {}",
                owner_id
            )));
        }

        for key in &keys {
            self.metadata.remove(key);
        }
        // 元数据可能属于已被覆盖或清理的 blob
        for record in self.metadata.list() {
            if record.owner_id.as_deref() == Some(owner_id) {
                if let Some(key) = record.key.strip_prefix(self.metadata.prefix()) {
                    self.metadata.remove(&CacheKey::from_normalized(key));
                }
            }
        }

        tracing::info!(owner_id = %owner_id, count = keys.len(), "Owner audio deleted");
        Ok(keys.len())
    }
}

// ============================================================================
// SweepAudio
// ============================================================================

/// SweepAudio Handler
pub struct SweepAudioHandler {
    blob_store: Arc<dyn BlobStorePort>,
    metadata: Arc<MetadataStore>,
}

impl SweepAudioHandler {
    pub fn new(blob_store: Arc<dyn BlobStorePort>, metadata: Arc<MetadataStore>) -> Self {
        Self {
            blob_store,
            metadata,
        }
    }

    /// 按年龄清理，返回删除的条目数
    pub async fn handle(&self, command: SweepAudio) -> Result<usize, ApplicationError> {
        if command.max_age_days == 0 {
            return Err(ApplicationError::validation("max_age_days must be at least 1"));
        }

        let removed = self.blob_store.sweep_older_than(command.max_age_days).await;

        if removed > 0 {
            for key in self.metadata.list_keys() {
                if !self.blob_store.contains(&key).await {
                    self.metadata.remove(&key);
                }
            }
        }

        tracing::info!(removed = removed, max_age_days = command.max_age_days, "Audio sweep finished");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::metadata_store::DEFAULT_METADATA_PREFIX;
    use crate::domain::AudioPayload;
    use crate::infrastructure::memory::ManualClock;
    use crate::infrastructure::persistence::flat::InMemoryFlatStore;
    use crate::infrastructure::persistence::sled::SledBlobStore;
    use chrono::{Duration, Utc};

    struct Fixture {
        blob_store: Arc<SledBlobStore>,
        metadata: Arc<MetadataStore>,
        clock: Arc<ManualClock>,
    }

    impl Fixture {
        fn new() -> Self {
            let clock = Arc::new(ManualClock::new(Utc::now()));
            Self {
                blob_store: Arc::new(SledBlobStore::temporary(clock.clone()).unwrap()),
                metadata: Arc::new(MetadataStore::new(
                    Arc::new(InMemoryFlatStore::new()),
                    DEFAULT_METADATA_PREFIX,
                    clock.clone(),
                )),
                clock,
            }
        }

        async fn seed(&self, owner_id: &str, sentence: &str) -> CacheKey {
            let filename = format!("{}_example_nova.mp3", owner_id);
            let key = self
                .blob_store
                .store(
                    owner_id,
                    sentence,
                    AudioPayload::from_generated(vec![1, 2, 3], filename.as_str()),
                )
                .await
                .unwrap();
            self.metadata
                .record_success(&key, owner_id, sentence, &filename, None);
            key
        }
    }

    #[tokio::test]
    async fn test_delete_clears_both_stores() {
        let fixture = Fixture::new();
        let key = fixture.seed("read", "I read books.").await;

        let handler = DeleteAudioHandler::new(fixture.blob_store.clone(), fixture.metadata.clone());
        let deleted = handler
            .handle(DeleteAudio {
                owner_id: "read".to_string(),
                sentence: "I READ books.".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(deleted, key);
        assert!(fixture.blob_store.get_record(&key).await.is_none());
        assert!(fixture.metadata.get(&key).is_none());
    }

    #[tokio::test]
    async fn test_delete_owner_audio() {
        let fixture = Fixture::new();
        let a = fixture.seed("read", "I read books.").await;
        let b = fixture.seed("read", "She reads a lot.").await;
        let c = fixture.seed("write", "I write letters.").await;

        let handler =
            DeleteOwnerAudioHandler::new(fixture.blob_store.clone(), fixture.metadata.clone());
        let count = handler
            .handle(DeleteOwnerAudio {
                owner_id: "read".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert!(fixture.metadata.get(&a).is_none());
        assert!(fixture.metadata.get(&b).is_none());
        assert!(fixture.metadata.get(&c).is_some());

        let err = handler
            .handle(DeleteOwnerAudio {
                owner_id: " ".to_string(),
            })
            .await;
        assert!(matches!(err, Err(ApplicationError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_sweep_clears_metadata_of_expired_audio() {
        let fixture = Fixture::new();
        let old = fixture.seed("old", "An old sentence.").await;
        fixture.clock.advance(Duration::days(20));
        let recent = fixture.seed("new", "A new sentence.").await;
        fixture.clock.advance(Duration::days(20));

        let handler = SweepAudioHandler::new(fixture.blob_store.clone(), fixture.metadata.clone());
        let removed = handler.handle(SweepAudio { max_age_days: 30 }).await.unwrap();

        assert_eq!(removed, 1);
        assert!(fixture.metadata.get(&old).is_none());
        assert!(fixture.metadata.get(&recent).is_some());

        // 清理不影响命中统计
        let stats = fixture.blob_store.stats().await;
        assert_eq!(stats.hit_count, 0);
        assert_eq!(stats.miss_count, 0);
    }
}
