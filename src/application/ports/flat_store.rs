//! Flat Store Port - 文本键值存储
//!
//! 同步的键值接口，值为文本（JSON），用于轻量元数据

use thiserror::Error;

/// Flat Store 错误
#[derive(Debug, Error)]
pub enum FlatStoreError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Flat Store Port
///
/// 每次调用都是同步完成的；实现需要保证单键读写原子
pub trait FlatStorePort: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, FlatStoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), FlatStoreError>;

    /// 删除键，不存在时不报错
    fn remove(&self, key: &str) -> Result<(), FlatStoreError>;

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, FlatStoreError>;
}
