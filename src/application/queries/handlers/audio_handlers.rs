//! Audio Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::metadata_store::MetadataStore;
use crate::application::ports::{BlobStorePort, PreviewRegistryPort};
use crate::application::queries::audio_queries::{
    GetAudioMetadata, GetAudioMetadataResponse, GetCacheStats, GetCacheStatsResponse,
    ResolvePreview, ResolvePreviewResponse,
};
use crate::domain::derive_key;

/// GetAudioMetadata Handler - 查询并修复元数据
pub struct GetAudioMetadataHandler {
    blob_store: Arc<dyn BlobStorePort>,
    metadata: Arc<MetadataStore>,
    registry: Arc<dyn PreviewRegistryPort>,
}

impl GetAudioMetadataHandler {
    pub fn new(
        blob_store: Arc<dyn BlobStorePort>,
        metadata: Arc<MetadataStore>,
        registry: Arc<dyn PreviewRegistryPort>,
    ) -> Self {
        Self {
            blob_store,
            metadata,
            registry,
        }
    }

    pub async fn handle(
        &self,
        query: GetAudioMetadata,
    ) -> Result<GetAudioMetadataResponse, ApplicationError> {
        let key = derive_key(&query.sentence, &query.owner_id);
        let record = self.blob_store.get_record(&key).await;

        // 仍然有效的临时引用保留，过期的丢弃
        let live_preview = self
            .metadata
            .get(&key)
            .and_then(|m| m.preview_reference)
            .filter(|r| self.registry.resolve(r).is_some());

        let metadata = self
            .metadata
            .reconcile(&key, record.as_ref(), live_preview)
            .ok_or_else(|| ApplicationError::not_found("AudioMetadata", key.as_str()))?;

        Ok(GetAudioMetadataResponse {
            key,
            metadata,
            cached: record.is_some(),
        })
    }
}

/// ResolvePreview Handler - 按 token 取临时引用背后的字节
pub struct ResolvePreviewHandler {
    registry: Arc<dyn PreviewRegistryPort>,
}

impl ResolvePreviewHandler {
    pub fn new(registry: Arc<dyn PreviewRegistryPort>) -> Self {
        Self { registry }
    }

    pub fn handle(&self, query: ResolvePreview) -> Result<ResolvePreviewResponse, ApplicationError> {
        let payload = self
            .registry
            .resolve_token(query.token)
            .ok_or_else(|| ApplicationError::not_found("Preview", query.token.to_string()))?;

        Ok(ResolvePreviewResponse {
            content_type: payload.mime_type().to_string(),
            filename: payload.filename().map(str::to_string),
            audio_data: payload.into_data(),
        })
    }
}

/// GetCacheStats Handler
pub struct GetCacheStatsHandler {
    blob_store: Arc<dyn BlobStorePort>,
    metadata: Arc<MetadataStore>,
    registry: Arc<dyn PreviewRegistryPort>,
}

impl GetCacheStatsHandler {
    pub fn new(
        blob_store: Arc<dyn BlobStorePort>,
        metadata: Arc<MetadataStore>,
        registry: Arc<dyn PreviewRegistryPort>,
    ) -> Self {
        Self {
            blob_store,
            metadata,
            registry,
        }
    }

    pub async fn handle(&self, _query: GetCacheStats) -> GetCacheStatsResponse {
        GetCacheStatsResponse {
            blob_store: self.blob_store.stats().await,
            metadata_entries: self.metadata.list_keys().len(),
            live_previews: self.registry.len(),
        }
    }
}
