//! HTTP Audio Fetcher - 下载远程音频
//!
//! 实现 AudioFetcherPort trait

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::application::ports::{AudioFetcherPort, FetchError};
use crate::domain::{AudioFormat, AudioPayload};

/// 远程音频下载器
pub struct HttpAudioFetcher {
    client: Client,
}

impl HttpAudioFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        Ok(Self { client })
    }
}

/// 响应未声明类型时按 URL 后缀推断
fn mime_from_url(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    AudioFormat::from_filename(path)
        .unwrap_or_default()
        .mime_type()
}

#[async_trait]
impl AudioFetcherPort for HttpAudioFetcher {
    async fn fetch(&self, url: &str) -> Result<AudioPayload, FetchError> {
        tracing::debug!(url = %url, "Fetching remote audio");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("audio/"))
            .map(str::to_string)
            .unwrap_or_else(|| mime_from_url(url).to_string());

        let data = response
            .bytes()
            .await
            .map_err(|e| FetchError::NetworkError(e.to_string()))?
            .to_vec();

        if data.is_empty() {
            return Err(FetchError::Empty);
        }

        tracing::info!(url = %url, size_bytes = data.len(), "Remote audio fetched");
        Ok(AudioPayload::new(data, mime_type))
    }
}
