//! vocab-audio - 单词卡例句音频缓存服务
//!
//! - Domain: sentence/, audio/
//! - Application: commands, queries, playback, ports
//! - Infrastructure: http, memory, worker, persistence, adapters

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vocab_audio::application::{MediaImportPort, NoopMediaImport, TtsEnginePort};
use vocab_audio::config::{load_config, print_config, AppConfig, TtsProvider};
use vocab_audio::infrastructure::adapters::{
    AnkiConnectClient, AnkiConnectConfig, FakeTtsClient, HttpAudioFetcher, OpenAiTtsClient,
    OpenAiTtsConfig, RateLimiter, SymphoniaProbe,
};
use vocab_audio::infrastructure::http::{AppState, AudioOptions, AudioPorts, HttpServer, ServerConfig};
use vocab_audio::infrastructure::memory::{InMemoryPreviewRegistry, SystemClock};
use vocab_audio::infrastructure::persistence::{JsonFileFlatStore, SledBlobStore, SledBlobStoreConfig};
use vocab_audio::infrastructure::worker::{SweepWorker, SweepWorkerConfig};

fn build_tts(config: &AppConfig) -> anyhow::Result<Arc<dyn TtsEnginePort>> {
    match config.tts.provider {
        TtsProvider::Fake => {
            tracing::warn!("Using fake TTS engine, generated audio is silence");
            Ok(Arc::new(FakeTtsClient::with_defaults()))
        }
        TtsProvider::OpenAi => {
            let client = OpenAiTtsClient::new(OpenAiTtsConfig {
                api_key: config.tts.api_key.clone(),
                base_url: config.tts.base_url.clone(),
                model: config.tts.model.clone(),
                voice: config.tts.voice.clone(),
                response_format: config.tts.response_format.clone(),
                timeout_secs: config.tts.timeout_secs,
            })?;
            if !client.is_configured() {
                tracing::warn!("No TTS API key configured, only cached audio will be served");
            }
            Ok(Arc::new(client))
        }
    }
}

async fn build_media_import(config: &AppConfig) -> anyhow::Result<Arc<dyn MediaImportPort>> {
    if !config.anki.enabled {
        return Ok(Arc::new(NoopMediaImport));
    }

    let limiter = Arc::new(RateLimiter::new(config.anki.min_interval()));
    let client = AnkiConnectClient::new(
        AnkiConnectConfig {
            url: config.anki.url.clone(),
            min_interval: config.anki.min_interval(),
            max_retries: config.anki.max_retries,
            timeout_secs: config.anki.timeout_secs,
        },
        limiter,
    )?;
    if !client.check_version().await {
        tracing::warn!(url = %config.anki.url, "AnkiConnect not reachable, media import will be retried per request");
    }
    Ok(Arc::new(client))
}

async fn ensure_parent_dir(path: &std::path::Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log.filter_directive())),
        )
        .init();

    tracing::info!("vocab-audio - example sentence audio cache");
    print_config(&config);

    // 确保数据目录存在
    ensure_parent_dir(&config.storage.blob_path).await?;
    ensure_parent_dir(&config.storage.metadata_path).await?;

    let clock = Arc::new(SystemClock);

    // 存储
    let blob_store = Arc::new(SledBlobStore::open(
        &SledBlobStoreConfig {
            db_path: config.storage.blob_path.to_string_lossy().to_string(),
        },
        clock.clone(),
    )?);
    let flat_store = Arc::new(JsonFileFlatStore::open(&config.storage.metadata_path)?);
    let registry = Arc::new(InMemoryPreviewRegistry::new(
        config.server.public_base_url(),
        config.cache.preview_capacity,
    ));

    // 外部协作方
    let tts_engine = build_tts(&config)?;
    let media_import = build_media_import(&config).await?;
    let fetcher = Arc::new(HttpAudioFetcher::new(config.cache.fetch_timeout_secs)?);

    let state = Arc::new(AppState::new(
        AudioPorts {
            blob_store: blob_store.clone(),
            flat_store,
            registry,
            tts_engine,
            media_import,
            fetcher,
            probe: Arc::new(SymphoniaProbe::new()),
            clock,
        },
        AudioOptions {
            dedupe_inflight: config.cache.dedupe_inflight,
            max_age_days: config.cache.max_age_days,
            metadata_prefix: config.storage.metadata_prefix.clone(),
            retry_policy: config.playback.retry_policy(),
        },
    ));

    // 启动清理 Worker
    let shutdown = CancellationToken::new();
    let sweep_task = if config.cache.sweep_enabled {
        let worker = SweepWorker::new(
            SweepWorkerConfig {
                interval: Duration::from_secs(config.cache.sweep_interval_secs),
                max_age_days: config.cache.max_age_days,
            },
            state.sweep_handler.clone(),
        );
        Some(tokio::spawn(worker.run(shutdown.clone())))
    } else {
        None
    };

    let server = HttpServer::new(
        ServerConfig::new(&config.server.host, config.server.port),
        state,
    );

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    shutdown.cancel();
    if let Some(task) = sweep_task {
        task.await?;
    }
    blob_store.flush()?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
