//! Audio Fetcher Port - 远程音频下载
//!
//! 用于把词典发音等远程音频拉取到本地缓存

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::AudioPayload;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Remote audio is empty")]
    Empty,
}

#[async_trait]
pub trait AudioFetcherPort: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<AudioPayload, FetchError>;
}
