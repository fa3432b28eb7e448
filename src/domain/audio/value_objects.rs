//! Audio Context - Value Objects

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 音频格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Opus,
    Aac,
    Flac,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "wav" => Some(Self::Wav),
            "opus" | "ogg" => Some(Self::Opus),
            "aac" => Some(Self::Aac),
            "flac" => Some(Self::Flac),
            _ => None,
        }
    }

    /// 从文件名推断格式
    pub fn from_filename(filename: &str) -> Option<Self> {
        filename
            .rsplit_once('.')
            .and_then(|(_, ext)| Self::from_extension(ext))
    }

    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.split(';').next().unwrap_or_default().trim() {
            "audio/mpeg" | "audio/mp3" => Some(Self::Mp3),
            "audio/wav" | "audio/x-wav" | "audio/wave" => Some(Self::Wav),
            "audio/ogg" | "audio/opus" => Some(Self::Opus),
            "audio/aac" => Some(Self::Aac),
            "audio/flac" => Some(Self::Flac),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Opus => "opus",
            Self::Aac => "aac",
            Self::Flac => "flac",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Opus => "audio/ogg",
            Self::Aac => "audio/aac",
            Self::Flac => "audio/flac",
        }
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::Mp3
    }
}

/// 音频负载 - 原始字节及其类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioPayload {
    data: Vec<u8>,
    mime_type: String,
    filename: Option<String>,
}

impl AudioPayload {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            filename: None,
        }
    }

    /// 包装 TTS 返回的字节，类型由文件名推断
    pub fn from_generated(data: Vec<u8>, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let format = AudioFormat::from_filename(&filename).unwrap_or_default();
        Self {
            data,
            mime_type: format.mime_type().to_string(),
            filename: Some(filename),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn format(&self) -> Option<AudioFormat> {
        AudioFormat::from_mime_type(&self.mime_type)
            .or_else(|| self.filename().and_then(AudioFormat::from_filename))
    }

    /// 负载字节的 md5 摘要
    pub fn content_md5(&self) -> String {
        format!("{:x}", md5::compute(&self.data))
    }
}

/// 生成状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenerationState {
    pub attempted: bool,
    pub succeeded: bool,
}

impl GenerationState {
    pub fn succeeded() -> Self {
        Self {
            attempted: true,
            succeeded: true,
        }
    }

    pub fn failed() -> Self {
        Self {
            attempted: true,
            succeeded: false,
        }
    }
}

/// 临时音频引用
///
/// 只在创建它的进程会话内有效，重启后一律视为失效，不能作为持久数据使用
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioRef {
    pub session_id: Uuid,
    pub token: Uuid,
    pub url: String,
}

impl std::fmt::Display for AudioRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}
