//! Media Probe Port - 播放前校验
//!
//! 只读取容器与轨道元数据，不解码、不播放

use thiserror::Error;

use crate::domain::AudioPayload;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Audio payload is empty")]
    Empty,

    #[error("Unsupported media: {0}")]
    Unsupported(String),

    #[error("Malformed media: {0}")]
    Malformed(String),
}

/// 音频元数据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub codec: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<usize>,
    pub duration_ms: Option<u64>,
}

pub trait MediaProbePort: Send + Sync {
    fn probe(&self, payload: &AudioPayload) -> Result<MediaInfo, ProbeError>;
}
