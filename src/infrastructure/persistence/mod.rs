//! Persistence Layer - 数据持久化
//!
//! Sled（音频二进制）和 JSON 文件（元数据）存储实现

pub mod flat;
pub mod sled;

pub use self::flat::{InMemoryFlatStore, JsonFileFlatStore};
pub use self::sled::{SledBlobStore, SledBlobStoreConfig};
