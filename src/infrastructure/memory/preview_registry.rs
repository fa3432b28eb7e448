//! In-Memory Preview Registry Implementation

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::application::ports::PreviewRegistryPort;
use crate::domain::{AudioPayload, AudioRef, CacheKey};

/// 默认最多保留的引用数量
pub const DEFAULT_PREVIEW_CAPACITY: usize = 256;

struct PreviewEntry {
    key: CacheKey,
    payload: AudioPayload,
    seq: u64,
}

/// 内存临时引用表
///
/// 每个实例有自己的 session_id；重建实例等同于重启，旧引用全部失效。
/// 超出容量时淘汰最早注册的引用
pub struct InMemoryPreviewRegistry {
    session_id: Uuid,
    base_url: String,
    capacity: usize,
    entries: DashMap<Uuid, PreviewEntry>,
    next_seq: AtomicU64,
}

impl InMemoryPreviewRegistry {
    pub fn new(base_url: impl Into<String>, capacity: usize) -> Self {
        let session_id = Uuid::new_v4();
        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::info!(session_id = %session_id, capacity = capacity, "Preview registry initialized");
        Self {
            session_id,
            base_url,
            capacity: capacity.max(1),
            entries: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn preview_url(&self, token: Uuid) -> String {
        format!("{}/api/audio/preview/{}", self.base_url, token)
    }

    fn evict_oldest(&self) {
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.seq)
                .map(|e| *e.key());
            match oldest {
                Some(token) => {
                    if let Some((_, entry)) = self.entries.remove(&token) {
                        tracing::debug!(token = %token, key = %entry.key, "Preview evicted");
                    }
                }
                None => break,
            }
        }
    }
}

impl PreviewRegistryPort for InMemoryPreviewRegistry {
    fn session_id(&self) -> Uuid {
        self.session_id
    }

    fn register(&self, key: &CacheKey, payload: AudioPayload) -> AudioRef {
        let token = Uuid::new_v4();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            token,
            PreviewEntry {
                key: key.clone(),
                payload,
                seq,
            },
        );
        self.evict_oldest();

        tracing::debug!(token = %token, key = %key, "Preview registered");

        AudioRef {
            session_id: self.session_id,
            token,
            url: self.preview_url(token),
        }
    }

    fn resolve(&self, audio_ref: &AudioRef) -> Option<AudioPayload> {
        if audio_ref.session_id != self.session_id {
            return None;
        }
        self.resolve_token(audio_ref.token)
    }

    fn resolve_token(&self, token: Uuid) -> Option<AudioPayload> {
        self.entries.get(&token).map(|e| e.payload.clone())
    }

    fn revoke(&self, audio_ref: &AudioRef) -> bool {
        if audio_ref.session_id != self.session_id {
            return false;
        }
        let revoked = self.entries.remove(&audio_ref.token).is_some();
        if revoked {
            tracing::debug!(token = %audio_ref.token, "Preview revoked");
        }
        revoked
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> AudioPayload {
        AudioPayload::from_generated(vec![1, 2, 3], "read_example_nova.mp3")
    }

    #[test]
    fn test_register_resolve_revoke() {
        let registry = InMemoryPreviewRegistry::new("http://127.0.0.1:5880/", 8);
        let key = CacheKey::from_normalized("i read books.");

        let audio_ref = registry.register(&key, payload());
        assert_eq!(
            audio_ref.url,
            format!("http://127.0.0.1:5880/api/audio/preview/{}", audio_ref.token)
        );
        assert_eq!(registry.resolve(&audio_ref), Some(payload()));

        assert!(registry.revoke(&audio_ref));
        assert!(!registry.revoke(&audio_ref));
        assert_eq!(registry.resolve(&audio_ref), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_refs_from_previous_session_are_stale() {
        let key = CacheKey::from_normalized("i read books.");
        let before_restart = InMemoryPreviewRegistry::new("http://localhost", 8);
        let audio_ref = before_restart.register(&key, payload());

        let after_restart = InMemoryPreviewRegistry::new("http://localhost", 8);
        assert_ne!(before_restart.session_id(), after_restart.session_id());
        assert_eq!(after_restart.resolve(&audio_ref), None);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let registry = InMemoryPreviewRegistry::new("http://localhost", 2);
        let key = CacheKey::from_normalized("k");

        let first = registry.register(&key, payload());
        let second = registry.register(&key, payload());
        let third = registry.register(&key, payload());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve(&first), None);
        assert!(registry.resolve(&second).is_some());
        assert!(registry.resolve(&third).is_some());
    }
}
