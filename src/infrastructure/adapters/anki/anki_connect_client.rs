//! AnkiConnect Client - 卡片应用媒体库导入
//!
//! 实现 MediaImportPort trait
//!
//! AnkiConnect API:
//! POST http://127.0.0.1:8765
//! Request: {"action": "storeMediaFile", "version": 6, "params": {"filename": "...", "data": "<base64>"}}
//! Response: {"result": "...", "error": null}

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::rate_limiter::RateLimiter;
use crate::application::ports::{MediaImportError, MediaImportPort};

/// AnkiConnect API 版本
pub const API_VERSION: u32 = 6;

#[derive(Debug, Serialize)]
struct AnkiRequest<'a> {
    action: &'a str,
    version: u32,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct AnkiResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// AnkiConnect 客户端配置
#[derive(Debug, Clone)]
pub struct AnkiConnectConfig {
    pub url: String,
    /// 两次调用的最小间隔，同时作为重试退避的单位
    pub min_interval: Duration,
    /// 首次调用失败后的最大重试次数
    pub max_retries: u32,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for AnkiConnectConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8765".to_string(),
            min_interval: Duration::from_secs(1),
            max_retries: 3,
            timeout_secs: 10,
        }
    }
}

/// AnkiConnect 客户端
pub struct AnkiConnectClient {
    client: Client,
    config: AnkiConnectConfig,
    limiter: Arc<RateLimiter>,
}

impl AnkiConnectClient {
    pub fn new(config: AnkiConnectConfig, limiter: Arc<RateLimiter>) -> Result<Self, MediaImportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MediaImportError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            config,
            limiter,
        })
    }

    /// 调用 AnkiConnect，失败时按 `attempt * min_interval` 递增等待后重试
    pub async fn invoke(&self, action: &str, params: Value) -> Result<Value, MediaImportError> {
        let mut attempt = 0;
        loop {
            match self.invoke_once(action, &params).await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.min_interval * attempt;
                    tracing::warn!(
                        action = %action,
                        attempt = attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Flashcard API call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn invoke_once(&self, action: &str, params: &Value) -> Result<Value, MediaImportError> {
        self.limiter.acquire().await;

        let request = AnkiRequest {
            action,
            version: API_VERSION,
            params: params.clone(),
        };

        tracing::debug!(url = %self.config.url, action = %action, "Calling flashcard API");

        let response = self
            .client
            .post(&self.config.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                MediaImportError::ConnectionError(format!(
                    "Could not connect to Anki. Make sure Anki is running and AnkiConnect is installed: {}",
                    e
                ))
            })?;

        let body: AnkiResponse = response
            .json()
            .await
            .map_err(|e| MediaImportError::InvalidResponse(e.to_string()))?;

        match body.error {
            Some(error) => Err(MediaImportError::Rejected(error)),
            None => Ok(body.result),
        }
    }

    /// 检查 AnkiConnect 是否可用且版本足够
    pub async fn check_version(&self) -> bool {
        match self.invoke_once("version", &Value::Object(Default::default())).await {
            Ok(version) => version.as_u64().is_some_and(|v| v >= u64::from(API_VERSION)),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl MediaImportPort for AnkiConnectClient {
    async fn import_media(&self, data: &[u8], filename: &str) -> Result<String, MediaImportError> {
        let params = serde_json::json!({
            "filename": filename,
            "data": STANDARD.encode(data),
        });

        let result = self.invoke("storeMediaFile", params).await?;
        let stored = result.as_str().unwrap_or(filename).to_string();

        tracing::info!(filename = %stored, size_bytes = data.len(), "Audio stored in flashcard media");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, routing::post, Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 前 `failures` 次返回错误，之后成功
    async fn spawn_anki(failures: usize) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));

        let app = Router::new()
            .route(
                "/",
                post(
                    |State((calls, failures)): State<(Arc<AtomicUsize>, usize)>,
                     Json(body): Json<Value>| async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(body["version"], 6);
                        if n < failures {
                            Json(serde_json::json!({"result": null, "error": "collection is not available"}))
                        } else {
                            Json(serde_json::json!({"result": body["params"]["filename"], "error": null}))
                        }
                    },
                ),
            )
            .with_state((calls.clone(), failures));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), calls)
    }

    fn client(url: String) -> AnkiConnectClient {
        let config = AnkiConnectConfig {
            url,
            min_interval: Duration::from_millis(10),
            ..Default::default()
        };
        let limiter = Arc::new(RateLimiter::new(config.min_interval));
        AnkiConnectClient::new(config, limiter).unwrap()
    }

    #[tokio::test]
    async fn test_store_media_file() {
        let (url, calls) = spawn_anki(0).await;

        let stored = client(url)
            .import_media(b"mp3 bytes", "read_example_nova.mp3")
            .await
            .unwrap();
        assert_eq!(stored, "read_example_nova.mp3");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let (url, calls) = spawn_anki(2).await;

        let stored = client(url).import_media(b"x", "a.mp3").await.unwrap();
        assert_eq!(stored, "a.mp3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let (url, calls) = spawn_anki(usize::MAX).await;

        let err = client(url).import_media(b"x", "a.mp3").await.unwrap_err();
        assert!(matches!(err, MediaImportError::Rejected(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_unreachable_is_connection_error() {
        let config = AnkiConnectConfig {
            url: "http://127.0.0.1:9".to_string(),
            min_interval: Duration::from_millis(1),
            max_retries: 0,
            timeout_secs: 2,
        };
        let limiter = Arc::new(RateLimiter::new(config.min_interval));
        let client = AnkiConnectClient::new(config, limiter).unwrap();

        let err = client.import_media(b"x", "a.mp3").await.unwrap_err();
        assert!(matches!(err, MediaImportError::ConnectionError(_)));
    }
}
