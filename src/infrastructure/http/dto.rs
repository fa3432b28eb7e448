//! Data Transfer Objects

use serde::{Deserialize, Serialize};

use crate::application::{
    AcquireError, AcquireOutcome, GetAudioMetadataResponse, GetCacheStatsResponse, PlaybackState,
    SkipReason,
};
use crate::domain::MetadataRecord;

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

// ============================================================================
// Audio DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AcquireAudioRequest {
    pub owner_id: String,
    pub sentence: String,
    /// 只查缓存，不调用 TTS
    #[serde(default)]
    pub cache_only: bool,
    /// 忽略缓存强制重新生成
    #[serde(default)]
    pub regenerate: bool,
}

#[derive(Debug, Deserialize)]
pub struct CacheRemoteAudioRequest {
    pub owner_id: String,
    pub sentence: String,
    pub url: String,
}

/// metadata / delete 共用
#[derive(Debug, Deserialize)]
pub struct AudioKeyRequest {
    pub owner_id: String,
    pub sentence: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteOwnerAudioRequest {
    pub owner_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SweepAudioRequest {
    /// 未指定时使用配置值
    #[serde(default)]
    pub max_age_days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AcquireAudioResponse {
    pub success: bool,
    pub key: Option<String>,
    pub filename: Option<String>,
    /// 会话内有效的播放地址
    pub audio_url: Option<String>,
    pub from_cache: bool,
    /// unavailable / rejected / storage
    pub error_kind: Option<&'static str>,
    /// nothing_to_narrate / generation_disabled
    pub skipped: Option<&'static str>,
    pub message: Option<String>,
}

impl From<AcquireOutcome> for AcquireAudioResponse {
    fn from(outcome: AcquireOutcome) -> Self {
        let message = outcome.message();
        Self {
            success: outcome.success,
            key: outcome.key.map(|k| k.as_str().to_string()),
            filename: outcome.filename,
            audio_url: outcome.audio_ref.map(|r| r.url),
            from_cache: outcome.from_cache,
            error_kind: outcome.error.as_ref().map(|e| match e {
                AcquireError::ProviderUnavailable(_) => "unavailable",
                AcquireError::ProviderRejected(_) => "rejected",
                AcquireError::StorageFailure(_) => "storage",
            }),
            skipped: outcome.skipped.map(|s| match s {
                SkipReason::NothingToNarrate => "nothing_to_narrate",
                SkipReason::GenerationDisabled => "generation_disabled",
            }),
            message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AudioMetadataResponse {
    pub key: String,
    pub cached: bool,
    pub metadata: MetadataRecord,
}

impl From<GetAudioMetadataResponse> for AudioMetadataResponse {
    fn from(response: GetAudioMetadataResponse) -> Self {
        Self {
            key: response.key.as_str().to_string(),
            cached: response.cached,
            metadata: response.metadata,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteAudioResponse {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub metadata_entries: usize,
    pub live_previews: usize,
}

impl From<GetCacheStatsResponse> for CacheStatsResponse {
    fn from(response: GetCacheStatsResponse) -> Self {
        Self {
            total_entries: response.blob_store.total_entries,
            total_size_bytes: response.blob_store.total_size_bytes,
            hit_count: response.blob_store.hit_count,
            miss_count: response.blob_store.miss_count,
            metadata_entries: response.metadata_entries,
            live_previews: response.live_previews,
        }
    }
}

// ============================================================================
// Playback DTOs
// ============================================================================

/// 播放请求；带例句时校验失败会按策略重试
#[derive(Debug, Default, Deserialize)]
pub struct PlayAudioRequest {
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub sentence: Option<String>,
    /// acquire 返回的 audio_url
    #[serde(default)]
    pub audio_url: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct PlaybackResponse {
    /// idle / validating / playing / failed / retrying
    pub state: &'static str,
    pub audio_url: Option<String>,
    pub codec: Option<String>,
    pub sample_rate: Option<u32>,
    pub duration_ms: Option<u64>,
    /// 失败后不会再自动重试
    pub terminal: bool,
    pub message: Option<String>,
    /// 本次加载已进行的重试次数
    pub retries: u32,
}

impl PlaybackResponse {
    pub fn new(state: PlaybackState, retries: u32) -> Self {
        let base = Self {
            retries,
            ..Default::default()
        };
        match state {
            PlaybackState::Idle => Self {
                state: "idle",
                ..base
            },
            PlaybackState::Validating => Self {
                state: "validating",
                ..base
            },
            PlaybackState::Playing { audio_ref, info } => Self {
                state: "playing",
                audio_url: Some(audio_ref.url),
                codec: info.codec,
                sample_rate: info.sample_rate,
                duration_ms: info.duration_ms,
                ..base
            },
            PlaybackState::Failed { terminal, message } => Self {
                state: "failed",
                terminal,
                message: Some(message),
                ..base
            },
            PlaybackState::Retrying { attempt, delay } => Self {
                state: "retrying",
                message: Some(format!(
                    "Retry {} in {} ms",
                    attempt,
                    delay.as_millis()
                )),
                ..base
            },
        }
    }
}
