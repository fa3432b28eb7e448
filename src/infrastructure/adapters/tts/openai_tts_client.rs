//! OpenAI TTS Client - 调用 OpenAI 语音合成接口
//!
//! 实现 TtsEnginePort trait
//!
//! 外部 TTS API:
//! POST https://api.openai.com/v1/audio/speech
//! Request: {"model": "tts-1", "voice": "nova", "input": "...", "response_format": "mp3"}  (JSON)
//! Response: 音频二进制

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::application::ports::{GeneratedAudio, TtsEnginePort, TtsError};
use crate::domain::{derive_key, AudioFormat};

/// 可用音色
pub const VOICES: [&str; 10] = [
    "alloy", "ash", "ballad", "coral", "echo", "fable", "onyx", "nova", "sage", "shimmer",
];

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static UNSAFE_FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w-]").expect("valid regex"));

/// 合成请求体 (JSON)
#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

/// OpenAI TTS 客户端配置
#[derive(Debug, Clone)]
pub struct OpenAiTtsConfig {
    /// 未配置时调用直接返回 MissingCredentials
    pub api_key: Option<String>,
    pub base_url: String,
    /// tts-1 / tts-1-hd
    pub model: String,
    /// 固定音色；为空时按例句确定性选择
    pub voice: Option<String>,
    /// mp3 / opus / aac / flac / wav
    pub response_format: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for OpenAiTtsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            model: "tts-1".to_string(),
            voice: None,
            response_format: "mp3".to_string(),
            timeout_secs: 60,
        }
    }
}

impl OpenAiTtsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// OpenAI TTS 客户端
pub struct OpenAiTtsClient {
    client: Client,
    config: OpenAiTtsConfig,
}

impl OpenAiTtsClient {
    pub fn new(config: OpenAiTtsConfig) -> Result<Self, TtsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtsError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn speech_url(&self) -> String {
        format!("{}/v1/audio/speech", self.config.base_url.trim_end_matches('/'))
    }

    fn api_key(&self) -> Option<&str> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// 同一例句总是得到同一音色
    fn voice_for(&self, owner_id: &str, sentence: &str) -> String {
        if let Some(voice) = &self.config.voice {
            return voice.clone();
        }
        let key = derive_key(sentence, owner_id);
        let digest = md5::compute(key.as_str().as_bytes());
        VOICES[digest[0] as usize % VOICES.len()].to_string()
    }

    fn extension(&self) -> &'static str {
        AudioFormat::from_extension(&self.config.response_format)
            .unwrap_or_default()
            .extension()
    }
}

/// 卡片媒体库中的文件名：`<owner>_example_<voice>.<ext>`
pub fn example_filename(owner_id: &str, voice: &str, extension: &str) -> String {
    let lowered = owner_id.to_lowercase();
    let underscored = WHITESPACE_RE.replace_all(&lowered, "_");
    let safe_owner = UNSAFE_FILENAME_RE.replace_all(&underscored, "");
    format!("{}_example_{}.{}", safe_owner, voice, extension)
}

#[async_trait]
impl TtsEnginePort for OpenAiTtsClient {
    async fn generate(&self, owner_id: &str, sentence: &str) -> Result<GeneratedAudio, TtsError> {
        let api_key = self.api_key().ok_or(TtsError::MissingCredentials)?;
        if sentence.trim().is_empty() {
            return Err(TtsError::EmptySentence);
        }

        let voice = self.voice_for(owner_id, sentence);
        let request = SpeechRequest {
            model: &self.config.model,
            voice: &voice,
            input: sentence,
            response_format: &self.config.response_format,
        };

        tracing::debug!(
            url = %self.speech_url(),
            model = %self.config.model,
            voice = %voice,
            text_len = sentence.len(),
            "Sending TTS request"
        );

        let response = self
            .client
            .post(self.speech_url())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TtsError::Timeout
                } else if e.is_connect() {
                    TtsError::NetworkError(format!("Cannot connect to TTS service: {}", e))
                } else {
                    TtsError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(body);
            return Err(TtsError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| {
                AudioFormat::from_extension(self.extension())
                    .unwrap_or_default()
                    .mime_type()
                    .to_string()
            });

        let audio_data = response
            .bytes()
            .await
            .map_err(|e| TtsError::InvalidResponse(format!("Failed to read audio: {}", e)))?
            .to_vec();

        if audio_data.is_empty() {
            return Err(TtsError::InvalidResponse("Empty audio body".to_string()));
        }

        let filename = example_filename(owner_id, &voice, self.extension());

        tracing::info!(
            filename = %filename,
            voice = %voice,
            audio_size = audio_data.len(),
            "TTS generation completed"
        );

        Ok(GeneratedAudio {
            filename,
            audio_data,
            mime_type,
        })
    }

    fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }
}
