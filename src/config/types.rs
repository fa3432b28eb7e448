//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::RetryPolicy;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// TTS 引擎配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// 卡片应用（AnkiConnect）配置
    #[serde(default)]
    pub anki: AnkiConfig,

    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 缓存策略
    #[serde(default)]
    pub cache: CacheConfig,

    /// 播放重试策略
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 预览地址使用的 Base URL
    /// 如果未设置，则使用 http://{host}:{port}
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5880
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: None,
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 获取公开的 Base URL
    pub fn public_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| {
                let host = if self.host == "0.0.0.0" {
                    "localhost"
                } else {
                    &self.host
                };
                format!("http://{}:{}", host, self.port)
            })
    }
}

/// TTS 实现
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    #[default]
    OpenAi,
    /// 返回固定静音，本地开发用
    Fake,
}

/// TTS 引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub provider: TtsProvider,

    /// 未配置时仍可命中缓存，但不能生成
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_tts_base_url")]
    pub base_url: String,

    #[serde(default = "default_tts_model")]
    pub model: String,

    /// 固定音色；未设置时按例句确定性选择
    #[serde(default)]
    pub voice: Option<String>,

    #[serde(default = "default_response_format")]
    pub response_format: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,
}

fn default_tts_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

fn default_response_format() -> String {
    "mp3".to_string()
}

fn default_tts_timeout() -> u64 {
    60
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: TtsProvider::default(),
            api_key: None,
            base_url: default_tts_base_url(),
            model: default_tts_model(),
            voice: None,
            response_format: default_response_format(),
            timeout_secs: default_tts_timeout(),
        }
    }
}

/// AnkiConnect 配置
#[derive(Debug, Clone, Deserialize)]
pub struct AnkiConfig {
    /// 关闭后生成的音频不导入媒体库
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_anki_url")]
    pub url: String,

    /// 两次调用的最小间隔（毫秒）
    #[serde(default = "default_anki_interval")]
    pub min_interval_ms: u64,

    #[serde(default = "default_anki_retries")]
    pub max_retries: u32,

    #[serde(default = "default_anki_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_anki_url() -> String {
    "http://127.0.0.1:8765".to_string()
}

fn default_anki_interval() -> u64 {
    1000
}

fn default_anki_retries() -> u32 {
    3
}

fn default_anki_timeout() -> u64 {
    10
}

impl Default for AnkiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_anki_url(),
            min_interval_ms: default_anki_interval(),
            max_retries: default_anki_retries(),
            timeout_secs: default_anki_timeout(),
        }
    }
}

impl AnkiConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// 存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Sled 数据库目录（音频二进制）
    #[serde(default = "default_blob_path")]
    pub blob_path: PathBuf,

    /// JSON 元数据文件
    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,

    /// 元数据键前缀
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,
}

fn default_blob_path() -> PathBuf {
    PathBuf::from("data/audio.sled")
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from("data/audio_meta.json")
}

fn default_metadata_prefix() -> String {
    crate::application::DEFAULT_METADATA_PREFIX.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            blob_path: default_blob_path(),
            metadata_path: default_metadata_path(),
            metadata_prefix: default_metadata_prefix(),
        }
    }
}

/// 缓存策略
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// 超过该天数的音频被清理
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,

    /// 是否启用后台清理
    #[serde(default = "default_true")]
    pub sweep_enabled: bool,

    /// 后台清理间隔（秒）
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// 同键并发生成只调用一次 TTS
    #[serde(default = "default_true")]
    pub dedupe_inflight: bool,

    /// 同时存活的预览引用上限
    #[serde(default = "default_preview_capacity")]
    pub preview_capacity: usize,

    /// 远程音频下载超时（秒）
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

fn default_max_age_days() -> u32 {
    30
}

fn default_sweep_interval() -> u64 {
    6 * 3600
}

fn default_preview_capacity() -> usize {
    crate::infrastructure::memory::DEFAULT_PREVIEW_CAPACITY
}

fn default_fetch_timeout() -> u64 {
    30
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_days: default_max_age_days(),
            sweep_enabled: true,
            sweep_interval_secs: default_sweep_interval(),
            dedupe_inflight: true,
            preview_capacity: default_preview_capacity(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

/// 播放重试策略
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_playback_retries")]
    pub max_retries: u32,

    /// 首次重试延迟（毫秒），之后逐次翻倍
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_playback_retries() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    4000
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_retries: default_playback_retries(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl PlaybackConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LogConfig {
    /// EnvFilter 指令
    pub fn filter_directive(&self) -> String {
        format!("{},vocab_audio={},tower_http=debug", self.level, self.level)
    }
}
