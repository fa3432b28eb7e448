//! Media Import Port - 卡片应用媒体库
//!
//! 把生成的音频交给卡片应用的媒体库；调用方只记录失败，不传播

use async_trait::async_trait;
use thiserror::Error;

/// 媒体导入错误
#[derive(Debug, Error)]
pub enum MediaImportError {
    #[error("Could not connect to the flashcard application: {0}")]
    ConnectionError(String),

    #[error("Flashcard application rejected request: {0}")]
    Rejected(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Media Import Port
#[async_trait]
pub trait MediaImportPort: Send + Sync {
    /// 导入音频，返回媒体库中实际使用的文件名
    async fn import_media(&self, data: &[u8], filename: &str) -> Result<String, MediaImportError>;
}

/// 禁用媒体导入时使用的空实现
pub struct NoopMediaImport;

#[async_trait]
impl MediaImportPort for NoopMediaImport {
    async fn import_media(&self, _data: &[u8], filename: &str) -> Result<String, MediaImportError> {
        Ok(filename.to_string())
    }
}
