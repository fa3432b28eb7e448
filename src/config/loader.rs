//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml / config.local.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, TtsProvider};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 环境变量前缀
const ENV_PREFIX: &str = "VOCAB_AUDIO";

/// 加载应用配置
///
/// # 环境变量示例
/// - `VOCAB_AUDIO_SERVER__PORT=8080`
/// - `VOCAB_AUDIO_TTS__API_KEY=sk-...`
/// - `VOCAB_AUDIO_CACHE__MAX_AGE_DAYS=14`
/// - `VOCAB_AUDIO_ANKI__ENABLED=false`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 5880)?
        .set_default("tts.provider", "openai")?
        .set_default("tts.base_url", "https://api.openai.com")?
        .set_default("tts.model", "tts-1")?
        .set_default("tts.response_format", "mp3")?
        .set_default("tts.timeout_secs", 60)?
        .set_default("anki.enabled", true)?
        .set_default("anki.url", "http://127.0.0.1:8765")?
        .set_default("anki.min_interval_ms", 1000)?
        .set_default("anki.max_retries", 3)?
        .set_default("storage.blob_path", "data/audio.sled")?
        .set_default("storage.metadata_path", "data/audio_meta.json")?
        .set_default("cache.max_age_days", 30)?
        .set_default("cache.sweep_enabled", true)?
        .set_default("cache.sweep_interval_secs", 6 * 3600)?
        .set_default("cache.dedupe_inflight", true)?
        .set_default("log.level", "info")?;

    // 2. 配置文件
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: VOCAB_AUDIO_TTS__API_KEY=sk-...
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.tts.provider == TtsProvider::OpenAi && config.tts.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "TTS base URL cannot be empty".to_string(),
        ));
    }

    if config.anki.enabled && config.anki.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "AnkiConnect URL cannot be empty when media import is enabled".to_string(),
        ));
    }

    if config.cache.max_age_days == 0 {
        return Err(ConfigError::ValidationError(
            "cache.max_age_days must be at least 1".to_string(),
        ));
    }

    if config.cache.sweep_enabled && config.cache.sweep_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Sweep interval cannot be 0 when sweeping is enabled".to_string(),
        ));
    }

    if config.cache.preview_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "cache.preview_capacity must be at least 1".to_string(),
        ));
    }

    if config.playback.base_delay_ms > config.playback.max_delay_ms {
        return Err(ConfigError::ValidationError(
            "playback.base_delay_ms cannot exceed playback.max_delay_ms".to_string(),
        ));
    }

    Ok(())
}

/// API key 只显示首尾
fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Public Base URL: {}", config.server.public_base_url());
    tracing::info!("TTS Provider: {:?}", config.tts.provider);
    tracing::info!("TTS Model: {} ({})", config.tts.model, config.tts.response_format);
    tracing::info!(
        "TTS API Key: {}",
        config
            .tts
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .map(mask_secret)
            .unwrap_or_else(|| "<not set>".to_string())
    );
    tracing::info!("AnkiConnect: {} (enabled: {})", config.anki.url, config.anki.enabled);
    tracing::info!("Blob Store: {:?}", config.storage.blob_path);
    tracing::info!("Metadata File: {:?}", config.storage.metadata_path);
    tracing::info!("Cache Max Age: {} days", config.cache.max_age_days);
    if config.cache.sweep_enabled {
        tracing::info!("Sweep Interval: {}s", config.cache.sweep_interval_secs);
    }
    tracing::info!(
        "Playback Retries: {} ({}ms..{}ms)",
        config.playback.max_retries,
        config.playback.base_delay_ms,
        config.playback.max_delay_ms
    );
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
