//! Application State
//!
//! 包含所有 Command/Query Handlers 的应用状态

use std::sync::Arc;

use crate::application::{
    // Command handlers
    AcquireAudioHandler, CacheRemoteAudioHandler, DeleteAudioHandler, DeleteOwnerAudioHandler,
    SweepAudioHandler,
    // Query handlers
    GetAudioMetadataHandler, GetCacheStatsHandler, ResolvePreviewHandler,
    // Playback
    PlaybackController, RetryPolicy,
    // Ports
    AudioFetcherPort, BlobStorePort, Clock, FlatStorePort, MediaImportPort, MediaProbePort,
    MetadataStore, PreviewRegistryPort, TtsEnginePort, DEFAULT_METADATA_PREFIX,
};

/// 外部依赖
pub struct AudioPorts {
    pub blob_store: Arc<dyn BlobStorePort>,
    pub flat_store: Arc<dyn FlatStorePort>,
    pub registry: Arc<dyn PreviewRegistryPort>,
    pub tts_engine: Arc<dyn TtsEnginePort>,
    pub media_import: Arc<dyn MediaImportPort>,
    pub fetcher: Arc<dyn AudioFetcherPort>,
    /// 播放前校验
    pub probe: Arc<dyn MediaProbePort>,
    pub clock: Arc<dyn Clock>,
}

/// 行为开关
#[derive(Debug, Clone)]
pub struct AudioOptions {
    /// 同键并发生成只调用一次 TTS
    pub dedupe_inflight: bool,
    /// sweep 请求未指定天数时使用
    pub max_age_days: u32,
    pub metadata_prefix: String,
    pub retry_policy: RetryPolicy,
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self {
            dedupe_inflight: true,
            max_age_days: 30,
            metadata_prefix: DEFAULT_METADATA_PREFIX.to_string(),
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// 应用状态
pub struct AppState {
    // ========== Ports ==========
    pub blob_store: Arc<dyn BlobStorePort>,
    pub registry: Arc<dyn PreviewRegistryPort>,
    pub metadata: Arc<MetadataStore>,
    pub options: AudioOptions,
    /// 启动时 TTS 是否具备凭据
    pub tts_configured: bool,

    // ========== Command Handlers ==========
    pub acquire_handler: Arc<AcquireAudioHandler>,
    pub cache_remote_handler: CacheRemoteAudioHandler,
    pub delete_handler: DeleteAudioHandler,
    pub delete_owner_handler: DeleteOwnerAudioHandler,
    pub sweep_handler: Arc<SweepAudioHandler>,

    // ========== Query Handlers ==========
    pub get_metadata_handler: GetAudioMetadataHandler,
    pub resolve_preview_handler: ResolvePreviewHandler,
    pub stats_handler: GetCacheStatsHandler,

    // ========== Playback ==========
    /// 会话内唯一的播放器，新的加载取代上一次
    pub player: PlaybackController,
}

impl AppState {
    /// 创建应用状态
    pub fn new(ports: AudioPorts, options: AudioOptions) -> Self {
        let AudioPorts {
            blob_store,
            flat_store,
            registry,
            tts_engine,
            media_import,
            fetcher,
            probe,
            clock,
        } = ports;

        let tts_configured = tts_engine.is_configured();
        let metadata = Arc::new(MetadataStore::new(
            flat_store,
            options.metadata_prefix.clone(),
            clock.clone(),
        ));

        let acquire_handler = AcquireAudioHandler::new(
            blob_store.clone(),
            metadata.clone(),
            registry.clone(),
            tts_engine,
            media_import,
            clock,
        );
        let acquire_handler = Arc::new(if options.dedupe_inflight {
            acquire_handler
        } else {
            acquire_handler.without_dedupe()
        });
        let player = PlaybackController::new(
            acquire_handler.clone(),
            registry.clone(),
            probe,
            options.retry_policy,
        );

        Self {
            // Command handlers
            acquire_handler,
            cache_remote_handler: CacheRemoteAudioHandler::new(
                blob_store.clone(),
                metadata.clone(),
                registry.clone(),
                fetcher,
            ),
            delete_handler: DeleteAudioHandler::new(blob_store.clone(), metadata.clone()),
            delete_owner_handler: DeleteOwnerAudioHandler::new(blob_store.clone(), metadata.clone()),
            sweep_handler: Arc::new(SweepAudioHandler::new(blob_store.clone(), metadata.clone())),

            // Query handlers
            get_metadata_handler: GetAudioMetadataHandler::new(
                blob_store.clone(),
                metadata.clone(),
                registry.clone(),
            ),
            resolve_preview_handler: ResolvePreviewHandler::new(registry.clone()),
            stats_handler: GetCacheStatsHandler::new(
                blob_store.clone(),
                metadata.clone(),
                registry.clone(),
            ),

            player,

            // Ports
            blob_store,
            registry,
            metadata,
            options,
            tts_configured,
        }
    }
}
