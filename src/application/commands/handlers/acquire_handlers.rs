//! Acquire Handlers - 例句音频获取
//!
//! 流程: 例句 → 缓存键 → 查缓存 → 调用 TTS → 写 Blob Store 与 Flat Store → 导入媒体库

use std::sync::Arc;

use crate::application::commands::{AcquireAudio, AcquireOutcome, CacheRemoteAudio, SkipReason};
use crate::application::inflight::InFlightGenerations;
use crate::application::metadata_store::MetadataStore;
use crate::application::ports::{
    AudioFetcherPort, BlobStorePort, Clock, MediaImportPort, PreviewRegistryPort, TtsEnginePort,
    TtsError,
};
use crate::domain::{derive_key, extract_example_sentence, AudioPayload, AudioRef, CacheKey};

// ============================================================================
// AcquireAudio
// ============================================================================

/// AcquireAudio Handler
pub struct AcquireAudioHandler {
    blob_store: Arc<dyn BlobStorePort>,
    metadata: Arc<MetadataStore>,
    registry: Arc<dyn PreviewRegistryPort>,
    tts: Arc<dyn TtsEnginePort>,
    media_import: Arc<dyn MediaImportPort>,
    clock: Arc<dyn Clock>,
    inflight: Option<InFlightGenerations>,
}

impl AcquireAudioHandler {
    pub fn new(
        blob_store: Arc<dyn BlobStorePort>,
        metadata: Arc<MetadataStore>,
        registry: Arc<dyn PreviewRegistryPort>,
        tts: Arc<dyn TtsEnginePort>,
        media_import: Arc<dyn MediaImportPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            blob_store,
            metadata,
            registry,
            tts,
            media_import,
            clock,
            inflight: Some(InFlightGenerations::new()),
        }
    }

    /// 关闭同键生成去重
    pub fn without_dedupe(mut self) -> Self {
        self.inflight = None;
        self
    }

    pub async fn handle(&self, command: AcquireAudio) -> AcquireOutcome {
        let Some(narration) = extract_example_sentence(&command.sentence) else {
            tracing::debug!(owner_id = %command.owner_id, "Nothing to narrate");
            return AcquireOutcome::skipped(None, SkipReason::NothingToNarrate);
        };
        let key = derive_key(&command.sentence, &command.owner_id);

        if !command.bypass_cache {
            if let Some(outcome) = self.lookup_cached(&key).await {
                return outcome;
            }
        }

        if !command.allow_generate {
            if !command.bypass_cache {
                self.metadata.reconcile(&key, None, None);
            }
            tracing::debug!(key = %key, "Cache miss and generation disabled");
            return AcquireOutcome::skipped(Some(key), SkipReason::GenerationDisabled);
        }

        let guard = match &self.inflight {
            Some(inflight) => Some(inflight.acquire(&key).await),
            None => None,
        };

        // 等待期间可能已有相同请求完成
        if guard.is_some() && !command.bypass_cache {
            if let Some(outcome) = self.lookup_cached(&key).await {
                tracing::debug!(key = %key, "Served by concurrent generation");
                return outcome;
            }
        }

        self.generate(&command, &narration, key).await
    }

    /// 缓存命中时注册临时引用并修复元数据
    async fn lookup_cached(&self, key: &CacheKey) -> Option<AcquireOutcome> {
        let record = self.blob_store.get_record(key).await?;

        let previous = self.metadata.preview_reference(key);
        let audio_ref = self.registry.register(key, record.payload.clone());
        let repaired = self
            .metadata
            .reconcile(key, Some(&record), Some(audio_ref.clone()));
        release_superseded(self.registry.as_ref(), previous, &audio_ref);

        let filename = record
            .payload
            .filename()
            .map(str::to_string)
            .or_else(|| repaired.and_then(|m| m.filename))
            .unwrap_or_else(|| format!("tts_{}.mp3", self.clock.now().timestamp_millis()));

        tracing::debug!(key = %key, filename = %filename, "Audio served from cache");
        Some(AcquireOutcome::cached(key.clone(), filename, audio_ref))
    }

    async fn generate(&self, command: &AcquireAudio, narration: &str, key: CacheKey) -> AcquireOutcome {
        let generated = match self.tts.generate(&command.owner_id, narration).await {
            Ok(generated) if generated.audio_data.is_empty() => {
                Err(TtsError::InvalidResponse("provider returned no audio".to_string()))
            }
            other => other,
        };

        let generated = match generated {
            Ok(generated) => generated,
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    owner_id = %command.owner_id,
                    error = %e,
                    "Audio generation failed"
                );
                self.metadata
                    .record_failure(&key, &command.owner_id, &command.sentence);
                return AcquireOutcome::failed(key, e.into());
            }
        };

        let filename = generated.filename;
        let payload =
            AudioPayload::new(generated.audio_data, generated.mime_type).with_filename(filename.clone());

        if self
            .blob_store
            .store(&command.owner_id, &command.sentence, payload.clone())
            .await
            .is_none()
        {
            tracing::warn!(key = %key, "Generated audio could not be cached, continuing");
        }

        let previous = self.metadata.preview_reference(&key);
        let audio_ref = self.registry.register(&key, payload.clone());
        self.metadata.record_success(
            &key,
            &command.owner_id,
            &command.sentence,
            &filename,
            Some(audio_ref.clone()),
        );
        release_superseded(self.registry.as_ref(), previous, &audio_ref);

        match self.media_import.import_media(payload.data(), &filename).await {
            Ok(stored) => tracing::debug!(filename = %stored, "Audio imported into media library"),
            Err(e) => tracing::warn!(filename = %filename, error = %e, "Media import failed"),
        }

        tracing::info!(
            key = %key,
            owner_id = %command.owner_id,
            filename = %filename,
            size_bytes = payload.len(),
            "Audio generated"
        );

        AcquireOutcome::generated(key, filename, audio_ref)
    }
}

// ============================================================================
// CacheRemoteAudio
// ============================================================================

/// CacheRemoteAudio Handler
pub struct CacheRemoteAudioHandler {
    blob_store: Arc<dyn BlobStorePort>,
    metadata: Arc<MetadataStore>,
    registry: Arc<dyn PreviewRegistryPort>,
    fetcher: Arc<dyn AudioFetcherPort>,
}

impl CacheRemoteAudioHandler {
    pub fn new(
        blob_store: Arc<dyn BlobStorePort>,
        metadata: Arc<MetadataStore>,
        registry: Arc<dyn PreviewRegistryPort>,
        fetcher: Arc<dyn AudioFetcherPort>,
    ) -> Self {
        Self {
            blob_store,
            metadata,
            registry,
            fetcher,
        }
    }

    pub async fn handle(&self, command: CacheRemoteAudio) -> AcquireOutcome {
        let key = derive_key(&command.sentence, &command.owner_id);
        if key.is_empty() {
            return AcquireOutcome::skipped(None, SkipReason::NothingToNarrate);
        }

        if let Some(record) = self.blob_store.get_record(&key).await {
            let previous = self.metadata.preview_reference(&key);
            let audio_ref = self.registry.register(&key, record.payload.clone());
            let repaired = self
                .metadata
                .reconcile(&key, Some(&record), Some(audio_ref.clone()));
            release_superseded(self.registry.as_ref(), previous, &audio_ref);
            let filename = record
                .payload
                .filename()
                .map(str::to_string)
                .or_else(|| repaired.and_then(|m| m.filename))
                .unwrap_or_else(|| filename_from_url(&command.url));
            return AcquireOutcome::cached(key, filename, audio_ref);
        }

        let payload = match self.fetcher.fetch(&command.url).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(url = %command.url, error = %e, "Remote audio fetch failed");
                return AcquireOutcome::failed(key, e.into());
            }
        };

        let filename = payload
            .filename()
            .map(str::to_string)
            .unwrap_or_else(|| filename_from_url(&command.url));
        let payload = payload.with_filename(filename.clone());

        if self
            .blob_store
            .store(&command.owner_id, &command.sentence, payload.clone())
            .await
            .is_none()
        {
            tracing::warn!(key = %key, "Remote audio could not be cached, continuing");
        }

        let previous = self.metadata.preview_reference(&key);
        let audio_ref = self.registry.register(&key, payload);
        self.metadata.record_success(
            &key,
            &command.owner_id,
            &command.sentence,
            &filename,
            Some(audio_ref.clone()),
        );
        release_superseded(self.registry.as_ref(), previous, &audio_ref);

        tracing::info!(key = %key, url = %command.url, "Remote audio cached");
        AcquireOutcome::generated(key, filename, audio_ref)
    }
}

/// 元数据中被新引用替换掉的旧引用立即撤销
fn release_superseded(
    registry: &dyn PreviewRegistryPort,
    previous: Option<AudioRef>,
    current: &AudioRef,
) {
    if let Some(previous) = previous.filter(|p| p != current) {
        if registry.revoke(&previous) {
            tracing::debug!(url = %previous.url, "Superseded preview reference revoked");
        }
    }
}

/// URL 最后一段作为文件名
fn filename_from_url(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "remote_audio.mp3".to_string())
}
