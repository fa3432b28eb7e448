//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（BlobStore、FlatStore、TtsEngine、MediaImport 等）
//! - commands: CQRS 命令及处理器（获取、缓存、删除音频）
//! - queries: CQRS 查询及处理器（元数据、预览、统计）
//! - playback: 播放前校验与退避重试
//! - metadata_store: Flat Store 上的元数据视图
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod inflight;
pub mod metadata_store;
pub mod playback;
pub mod ports;
pub mod queries;

// Re-exports
pub use commands::{
    AcquireAudio,
    AcquireError,
    AcquireOutcome,
    CacheRemoteAudio,
    DeleteAudio,
    DeleteOwnerAudio,
    SkipReason,
    SweepAudio,
    // Handlers
    handlers::{
        AcquireAudioHandler, CacheRemoteAudioHandler, DeleteAudioHandler,
        DeleteOwnerAudioHandler, SweepAudioHandler,
    },
};

pub use error::ApplicationError;
pub use inflight::InFlightGenerations;
pub use metadata_store::{MetadataStore, DEFAULT_METADATA_PREFIX};
pub use playback::{PlaybackController, PlaybackError, PlaybackRequest, PlaybackState, RetryPolicy};

pub use ports::{
    // Stores
    BlobStoreError,
    BlobStorePort,
    BlobStoreStats,
    FlatStoreError,
    FlatStorePort,
    // Session
    Clock,
    PreviewRegistryPort,
    // Collaborators
    AudioFetcherPort,
    FetchError,
    GeneratedAudio,
    MediaImportError,
    MediaImportPort,
    MediaInfo,
    MediaProbePort,
    NoopMediaImport,
    ProbeError,
    TtsEnginePort,
    TtsError,
};

pub use queries::{
    GetAudioMetadata,
    GetAudioMetadataResponse,
    GetCacheStats,
    GetCacheStatsResponse,
    ResolvePreview,
    ResolvePreviewResponse,
    // Handlers
    handlers::{GetAudioMetadataHandler, GetCacheStatsHandler, ResolvePreviewHandler},
};
