//! TTS Engine Port - 例句语音合成
//!
//! 定义 TTS 合成的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use thiserror::Error;

/// TTS 错误
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("TTS API key is not configured")]
    MissingCredentials,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Provider rejected request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Example sentence is required for audio generation")]
    EmptySentence,
}

impl TtsError {
    /// 服务不可达（无凭据、网络、超时），区别于服务端拒绝
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::MissingCredentials | Self::NetworkError(_) | Self::Timeout
        )
    }
}

/// TTS 合成结果
#[derive(Debug, Clone)]
pub struct GeneratedAudio {
    /// 服务端/客户端分配的音频文件名（同时用作卡片媒体库中的文件名）
    pub filename: String,
    /// 原始音频字节
    pub audio_data: Vec<u8>,
    pub mime_type: String,
}

/// TTS Engine Port
///
/// 外部 TTS 服务的抽象接口
#[async_trait]
pub trait TtsEnginePort: Send + Sync {
    /// 为 owner（单词/卡片）的例句合成语音
    async fn generate(&self, owner_id: &str, sentence: &str) -> Result<GeneratedAudio, TtsError>;

    /// 是否具备调用条件（例如已配置 API key）
    fn is_configured(&self) -> bool {
        true
    }
}
