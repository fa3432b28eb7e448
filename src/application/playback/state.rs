//! Playback State

use std::time::Duration;
use thiserror::Error;

use crate::application::ports::MediaInfo;
use crate::domain::AudioRef;

/// 播放状态
///
/// ```text
/// Idle → Validating → Playing
///                   ↘ Failed → Retrying → Validating
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackState {
    Idle,
    Validating,
    Playing {
        audio_ref: AudioRef,
        info: MediaInfo,
    },
    Failed {
        /// 为 true 时不会再自动重试
        terminal: bool,
        message: String,
    },
    Retrying {
        attempt: u32,
        delay: Duration,
    },
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing { .. })
    }

    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, Self::Failed { terminal: true, .. })
    }
}

/// 播放错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// 引用来自上一个会话或已被撤销
    #[error("Audio reference is stale")]
    StaleReference,

    #[error("Invalid media: {0}")]
    InvalidMedia(String),

    #[error("No audio reference and no sentence to acquire it from")]
    NothingToPlay,

    #[error("Playback cancelled")]
    Cancelled,

    #[error("Nothing is playing")]
    NotPlaying,
}

impl PlaybackError {
    /// 展示给用户的说明，不暴露引用失效等内部细节
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::StaleReference => "Preparing audio again.",
            Self::InvalidMedia(_) => "This audio file could not be read.",
            Self::NothingToPlay | Self::NotPlaying => "Nothing to play.",
            Self::Cancelled => "Playback was stopped.",
        }
    }
}

/// 播放请求
///
/// 带例句时失败可以重试（重新解析引用或重新生成）
#[derive(Debug, Clone, Default)]
pub struct PlaybackRequest {
    pub audio_ref: Option<AudioRef>,
    pub owner_id: Option<String>,
    pub sentence: Option<String>,
}

impl PlaybackRequest {
    pub fn for_sentence(owner_id: impl Into<String>, sentence: impl Into<String>) -> Self {
        Self {
            audio_ref: None,
            owner_id: Some(owner_id.into()),
            sentence: Some(sentence.into()),
        }
    }

    pub fn for_ref(audio_ref: AudioRef) -> Self {
        Self {
            audio_ref: Some(audio_ref),
            ..Default::default()
        }
    }

    pub fn with_ref(mut self, audio_ref: AudioRef) -> Self {
        self.audio_ref = Some(audio_ref);
        self
    }

    /// 可重试所需的 (owner_id, sentence)
    pub fn source(&self) -> Option<(&str, &str)> {
        match (&self.owner_id, &self.sentence) {
            (Some(owner_id), Some(sentence)) => Some((owner_id.as_str(), sentence.as_str())),
            _ => None,
        }
    }
}
