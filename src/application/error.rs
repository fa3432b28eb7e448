//! 应用层错误定义
//!
//! 命令/查询共用。获取音频的失败走 AcquireOutcome，不在这里。

use thiserror::Error;

use crate::domain::CacheKey;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 缓存条目、元数据或预览引用不存在
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// TTS、远程下载等外部服务失败
    #[error("External service error: {0}")]
    ExternalServiceError(String),

    /// Blob Store / Flat Store 写入失败
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 某个缓存键的存储操作失败
    pub fn storage(action: &str, key: &CacheKey) -> Self {
        Self::StorageError(format!("failed to {} audio for {}", action, key))
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::ExternalServiceError(message.into())
    }
}
