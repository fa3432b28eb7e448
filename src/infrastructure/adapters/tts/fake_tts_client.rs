//! Fake TTS Client - 用于本地开发和测试的 TTS 客户端
//!
//! 不调用任何外部服务，始终返回一段可被正常探测的静音 WAV

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::application::ports::{GeneratedAudio, TtsEnginePort, TtsError};

/// Fake TTS Client 配置
#[derive(Debug, Clone)]
pub struct FakeTtsClientConfig {
    /// 模拟推理延迟
    pub latency: Option<Duration>,
    /// 生成音频的时长（毫秒）
    pub duration_ms: u64,
    /// 采样率
    pub sample_rate: u32,
}

impl Default for FakeTtsClientConfig {
    fn default() -> Self {
        Self {
            latency: None,
            duration_ms: 100,
            sample_rate: 8000,
        }
    }
}

/// Fake TTS Client
///
/// 记录调用次数，可切换为失败模式以模拟服务不可达
pub struct FakeTtsClient {
    config: FakeTtsClientConfig,
    audio_data: Vec<u8>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeTtsClient {
    pub fn new(config: FakeTtsClientConfig) -> Self {
        let audio_data = silent_wav(config.sample_rate, config.duration_ms);
        tracing::info!(
            duration_ms = config.duration_ms,
            sample_rate = config.sample_rate,
            "FakeTtsClient initialized"
        );
        Self {
            config,
            audio_data,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(FakeTtsClientConfig::default())
    }

    /// 切换失败模式（失败时返回网络错误）
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// generate 被调用的次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 返回的固定音频字节
    pub fn audio_data(&self) -> &[u8] {
        &self.audio_data
    }
}

#[async_trait]
impl TtsEnginePort for FakeTtsClient {
    async fn generate(&self, owner_id: &str, sentence: &str) -> Result<GeneratedAudio, TtsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(
            owner_id = %owner_id,
            sentence_len = sentence.len(),
            "FakeTtsClient: returning fixed audio"
        );

        if let Some(latency) = self.config.latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(TtsError::NetworkError("fake provider is offline".to_string()));
        }

        if sentence.trim().is_empty() {
            return Err(TtsError::EmptySentence);
        }

        Ok(GeneratedAudio {
            filename: format!("{}_example_fake.wav", owner_id),
            audio_data: self.audio_data.clone(),
            mime_type: "audio/wav".to_string(),
        })
    }
}

/// 16-bit 单声道静音 WAV
pub fn silent_wav(sample_rate: u32, duration_ms: u64) -> Vec<u8> {
    let samples = (sample_rate as u64 * duration_ms / 1000) as u32;
    let data_len = samples * 2;

    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(44 + data_len as usize, 0);
    wav
}
