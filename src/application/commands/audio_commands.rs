//! Audio Commands - 音频获取与维护命令

use thiserror::Error;

use crate::application::ports::{FetchError, TtsError};
use crate::domain::{AudioRef, CacheKey};

/// 获取例句音频
#[derive(Debug, Clone)]
pub struct AcquireAudio {
    /// 单词/卡片标识，只作为来源信息
    pub owner_id: String,
    pub sentence: String,
    /// 缓存未命中时是否允许调用 TTS
    pub allow_generate: bool,
    /// 跳过缓存直接重新生成（缓存字节本身有问题时使用）
    pub bypass_cache: bool,
}

impl AcquireAudio {
    pub fn new(owner_id: impl Into<String>, sentence: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            sentence: sentence.into(),
            allow_generate: true,
            bypass_cache: false,
        }
    }

    /// 只查缓存
    pub fn cache_only(mut self) -> Self {
        self.allow_generate = false;
        self.bypass_cache = false;
        self
    }

    /// 强制重新生成
    pub fn regenerate(mut self) -> Self {
        self.allow_generate = true;
        self.bypass_cache = true;
        self
    }
}

/// 拉取远程音频（如词典发音）并缓存
#[derive(Debug, Clone)]
pub struct CacheRemoteAudio {
    pub owner_id: String,
    pub sentence: String,
    pub url: String,
}

/// 删除单条例句音频
#[derive(Debug, Clone)]
pub struct DeleteAudio {
    pub owner_id: String,
    pub sentence: String,
}

/// 删除某个单词/卡片的全部音频
#[derive(Debug, Clone)]
pub struct DeleteOwnerAudio {
    pub owner_id: String,
}

/// 按年龄清理
#[derive(Debug, Clone)]
pub struct SweepAudio {
    pub max_age_days: u32,
}

/// 获取失败原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    /// 无凭据、网络不可达、超时
    #[error("Audio provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// 请求被拒绝（参数、配额、无效响应）
    #[error("Audio provider rejected request: {0}")]
    ProviderRejected(String),

    /// 本地存储失败（仅用于日志，不作为结果返回）
    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl From<TtsError> for AcquireError {
    fn from(err: TtsError) -> Self {
        if err.is_unavailable() {
            Self::ProviderUnavailable(err.to_string())
        } else {
            Self::ProviderRejected(err.to_string())
        }
    }
}

impl From<FetchError> for AcquireError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NetworkError(_) => Self::ProviderUnavailable(err.to_string()),
            FetchError::Status(_) | FetchError::Empty => Self::ProviderRejected(err.to_string()),
        }
    }
}

/// 未尝试获取的原因（不是错误）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 没有可朗读的例句
    NothingToNarrate,
    /// 缓存未命中且不允许生成
    GenerationDisabled,
}

/// 获取结果
///
/// 失败以结构化结果返回而不是错误，便于播放控制器据此重试
#[derive(Debug, Clone)]
pub struct AcquireOutcome {
    pub success: bool,
    pub key: Option<CacheKey>,
    pub filename: Option<String>,
    pub audio_ref: Option<AudioRef>,
    pub from_cache: bool,
    pub error: Option<AcquireError>,
    pub skipped: Option<SkipReason>,
}

impl AcquireOutcome {
    pub fn cached(key: CacheKey, filename: String, audio_ref: AudioRef) -> Self {
        Self {
            success: true,
            key: Some(key),
            filename: Some(filename),
            audio_ref: Some(audio_ref),
            from_cache: true,
            error: None,
            skipped: None,
        }
    }

    pub fn generated(key: CacheKey, filename: String, audio_ref: AudioRef) -> Self {
        Self {
            from_cache: false,
            ..Self::cached(key, filename, audio_ref)
        }
    }

    pub fn failed(key: CacheKey, error: AcquireError) -> Self {
        Self {
            success: false,
            key: Some(key),
            filename: None,
            audio_ref: None,
            from_cache: false,
            error: Some(error),
            skipped: None,
        }
    }

    pub fn skipped(key: Option<CacheKey>, reason: SkipReason) -> Self {
        Self {
            success: false,
            key,
            filename: None,
            audio_ref: None,
            from_cache: false,
            error: None,
            skipped: Some(reason),
        }
    }

    /// 面向用户的说明
    pub fn message(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(match error {
                AcquireError::ProviderUnavailable(_) => {
                    "Audio generation is unavailable. Check the API key and network, then retry."
                        .to_string()
                }
                AcquireError::ProviderRejected(msg) => {
                    format!("Audio generation failed: {}", msg)
                }
                AcquireError::StorageFailure(msg) => format!("Audio could not be saved: {}", msg),
            });
        }
        match self.skipped {
            Some(SkipReason::NothingToNarrate) => Some("No example sentence to narrate.".to_string()),
            Some(SkipReason::GenerationDisabled) => {
                Some("No cached audio and generation is disabled.".to_string())
            }
            None => None,
        }
    }
}
