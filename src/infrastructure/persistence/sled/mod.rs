//! Sled 存储实现

mod blob_store;

pub use blob_store::{SledBlobStore, SledBlobStoreConfig, SCHEMA_VERSION};
