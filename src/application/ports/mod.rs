//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_fetcher;
mod blob_store;
mod clock;
mod flat_store;
mod media_import;
mod media_probe;
mod preview_registry;
mod tts_engine;

pub use audio_fetcher::{AudioFetcherPort, FetchError};
pub use blob_store::{BlobStoreError, BlobStorePort, BlobStoreStats};
pub use clock::Clock;
pub use flat_store::{FlatStoreError, FlatStorePort};
pub use media_import::{MediaImportError, MediaImportPort, NoopMediaImport};
pub use media_probe::{MediaInfo, MediaProbePort, ProbeError};
pub use preview_registry::PreviewRegistryPort;
pub use tts_engine::{GeneratedAudio, TtsEnginePort, TtsError};
