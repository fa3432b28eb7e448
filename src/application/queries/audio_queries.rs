//! Audio Queries - 音频查询

use uuid::Uuid;

use crate::application::ports::BlobStoreStats;
use crate::domain::{CacheKey, MetadataRecord};

/// 查询例句音频元数据（读时修复）
#[derive(Debug, Clone)]
pub struct GetAudioMetadata {
    pub owner_id: String,
    pub sentence: String,
}

/// 元数据查询响应
#[derive(Debug, Clone)]
pub struct GetAudioMetadataResponse {
    pub key: CacheKey,
    pub metadata: MetadataRecord,
    /// Blob Store 中是否有音频
    pub cached: bool,
}

/// 通过临时引用 token 取音频
#[derive(Debug, Clone)]
pub struct ResolvePreview {
    pub token: Uuid,
}

/// 预览响应
#[derive(Debug, Clone)]
pub struct ResolvePreviewResponse {
    pub audio_data: Vec<u8>,
    pub content_type: String,
    pub filename: Option<String>,
}

/// 缓存统计
#[derive(Debug, Clone, Default)]
pub struct GetCacheStats;

#[derive(Debug, Clone)]
pub struct GetCacheStatsResponse {
    pub blob_store: BlobStoreStats,
    pub metadata_entries: usize,
    pub live_previews: usize,
}
