//! Audio Handlers

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::application::{
    AcquireAudio, CacheRemoteAudio, DeleteAudio, DeleteOwnerAudio, GetAudioMetadata,
    GetCacheStats, PlaybackRequest, PreviewRegistryPort, ResolvePreview, SweepAudio,
};
use crate::domain::AudioRef;
use crate::infrastructure::http::dto::{
    AcquireAudioRequest, AcquireAudioResponse, ApiResponse, AudioKeyRequest,
    AudioMetadataResponse, CacheRemoteAudioRequest, CacheStatsResponse, DeleteAudioResponse,
    DeleteOwnerAudioRequest, PlayAudioRequest, PlaybackResponse, RemovedResponse,
    SweepAudioRequest,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 获取例句音频（查缓存，必要时生成）
pub async fn acquire_audio(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AcquireAudioRequest>,
) -> Json<ApiResponse<AcquireAudioResponse>> {
    let mut command = AcquireAudio::new(req.owner_id, req.sentence);
    if req.cache_only {
        command = command.cache_only();
    }
    if req.regenerate {
        command = command.regenerate();
    }

    let outcome = state.acquire_handler.handle(command).await;
    Json(ApiResponse::success(outcome.into()))
}

/// 拉取远程音频并缓存
pub async fn cache_remote_audio(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CacheRemoteAudioRequest>,
) -> Result<Json<ApiResponse<AcquireAudioResponse>>, ApiError> {
    if req.url.trim().is_empty() {
        return Err(ApiError::BadRequest("url must not be empty".to_string()));
    }

    let outcome = state
        .cache_remote_handler
        .handle(CacheRemoteAudio {
            owner_id: req.owner_id,
            sentence: req.sentence,
            url: req.url,
        })
        .await;
    Ok(Json(ApiResponse::success(outcome.into())))
}

/// 查询元数据（读时修复）
pub async fn get_audio_metadata(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AudioKeyRequest>,
) -> Result<Json<ApiResponse<AudioMetadataResponse>>, ApiError> {
    let response = state
        .get_metadata_handler
        .handle(GetAudioMetadata {
            owner_id: req.owner_id,
            sentence: req.sentence,
        })
        .await?;
    Ok(Json(ApiResponse::success(response.into())))
}

pub async fn delete_audio(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AudioKeyRequest>,
) -> Result<Json<ApiResponse<DeleteAudioResponse>>, ApiError> {
    let key = state
        .delete_handler
        .handle(DeleteAudio {
            owner_id: req.owner_id,
            sentence: req.sentence,
        })
        .await?;
    Ok(Json(ApiResponse::success(DeleteAudioResponse {
        key: key.as_str().to_string(),
    })))
}

pub async fn delete_owner_audio(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteOwnerAudioRequest>,
) -> Result<Json<ApiResponse<RemovedResponse>>, ApiError> {
    let removed = state
        .delete_owner_handler
        .handle(DeleteOwnerAudio {
            owner_id: req.owner_id,
        })
        .await?;
    Ok(Json(ApiResponse::success(RemovedResponse { removed })))
}

pub async fn sweep_audio(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SweepAudioRequest>,
) -> Result<Json<ApiResponse<RemovedResponse>>, ApiError> {
    let max_age_days = req.max_age_days.unwrap_or(state.options.max_age_days);
    let removed = state
        .sweep_handler
        .handle(SweepAudio { max_age_days })
        .await?;
    Ok(Json(ApiResponse::success(RemovedResponse { removed })))
}

pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<CacheStatsResponse>> {
    let stats = state.stats_handler.handle(GetCacheStats).await;
    Json(ApiResponse::success(stats.into()))
}

/// 按临时引用返回音频字节；引用过期返回 404 errno
pub async fn preview_audio(
    State(state): State<Arc<AppState>>,
    Path(token): Path<Uuid>,
) -> Result<Response, ApiError> {
    let preview = state.resolve_preview_handler.handle(ResolvePreview { token })?;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, preview.content_type)
        .header(header::CONTENT_LENGTH, preview.audio_data.len())
        .header(header::CACHE_CONTROL, "no-store");
    if let Some(filename) = &preview.filename {
        builder = builder.header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", filename),
        );
    }

    builder
        .body(Body::from(preview.audio_data))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// 预览地址最后一段是 token；不属于当前会话的 token 解析时按过期处理
fn audio_ref_from_url(registry: &dyn PreviewRegistryPort, url: &str) -> Result<AudioRef, ApiError> {
    let token = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|segment| Uuid::parse_str(segment).ok())
        .ok_or_else(|| ApiError::BadRequest(format!("not a preview url: {}", url)))?;

    Ok(AudioRef {
        session_id: registry.session_id(),
        token,
        url: url.to_string(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn playback_response(state: &AppState) -> Json<ApiResponse<PlaybackResponse>> {
    Json(ApiResponse::success(PlaybackResponse::new(
        state.player.state(),
        state.player.retry_count(),
    )))
}

/// 在会话播放器中加载并校验音频，取代正在进行的加载
pub async fn play_audio(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlayAudioRequest>,
) -> Result<Json<ApiResponse<PlaybackResponse>>, ApiError> {
    let audio_ref = match non_empty(req.audio_url) {
        Some(url) => Some(audio_ref_from_url(state.registry.as_ref(), &url)?),
        None => None,
    };
    let request = PlaybackRequest {
        audio_ref,
        owner_id: non_empty(req.owner_id),
        sentence: non_empty(req.sentence),
    };
    if request.audio_ref.is_none() && request.source().is_none() {
        return Err(ApiError::BadRequest(
            "audio_url or owner_id with sentence is required".to_string(),
        ));
    }

    // 失败原因体现在返回的播放状态里
    if let Err(e) = state.player.load(request).await {
        tracing::debug!(error = %e, "Playback not started");
    }
    Ok(playback_response(&state))
}

pub async fn playback_state(State(state): State<Arc<AppState>>) -> Json<ApiResponse<PlaybackResponse>> {
    playback_response(&state)
}

/// 停止播放并释放持有的引用
pub async fn stop_playback(State(state): State<Arc<AppState>>) -> Json<ApiResponse<PlaybackResponse>> {
    state.player.cancel();
    playback_response(&state)
}

#[cfg(test)]
mod tests {
    use crate::application::{AudioFetcherPort, FetchError, NoopMediaImport};
    use crate::domain::AudioPayload;
    use crate::infrastructure::adapters::{FakeTtsClient, SymphoniaProbe};
    use crate::infrastructure::http::routes::create_routes;
    use crate::infrastructure::http::state::{AppState, AudioOptions, AudioPorts};
    use crate::infrastructure::memory::{InMemoryPreviewRegistry, SystemClock};
    use crate::infrastructure::persistence::{InMemoryFlatStore, SledBlobStore};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::util::ServiceExt;

    const SENTENCE: &str = "I read about the new discoveries in quantum physics.";

    struct StaticFetcher;

    #[async_trait]
    impl AudioFetcherPort for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<AudioPayload, FetchError> {
            if url.ends_with("missing.mp3") {
                return Err(FetchError::Status(404));
            }
            Ok(AudioPayload::new(vec![7, 7, 7], "audio/mpeg"))
        }
    }

    fn app() -> (Router, Arc<FakeTtsClient>) {
        let clock = Arc::new(SystemClock);
        let tts = Arc::new(FakeTtsClient::with_defaults());
        let state = AppState::new(
            AudioPorts {
                blob_store: Arc::new(SledBlobStore::temporary(clock.clone()).unwrap()),
                flat_store: Arc::new(InMemoryFlatStore::new()),
                registry: Arc::new(InMemoryPreviewRegistry::new("http://localhost:5060", 16)),
                tts_engine: tts.clone(),
                media_import: Arc::new(NoopMediaImport),
                fetcher: Arc::new(StaticFetcher),
                probe: Arc::new(SymphoniaProbe::new()),
                clock,
            },
            AudioOptions::default(),
        );
        (create_routes().with_state(Arc::new(state)), tts)
    }

    async fn post(app: &Router, uri: &str, body: Value) -> Value {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn preview_path(audio_url: &str) -> String {
        audio_url
            .trim_start_matches("http://localhost:5060")
            .to_string()
    }

    #[tokio::test]
    async fn test_ping() {
        let (app, _) = app();
        let request = Request::builder().uri("/api/ping").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_acquire_then_preview() {
        let (app, tts) = app();

        let first = post(&app, "/api/audio/acquire", json!({"owner_id": "read", "sentence": SENTENCE})).await;
        assert_eq!(first["errno"], 0);
        assert_eq!(first["data"]["success"], true);
        assert_eq!(first["data"]["from_cache"], false);
        assert_eq!(first["data"]["filename"], "read_example_fake.wav");

        let second = post(&app, "/api/audio/acquire", json!({"owner_id": "read", "sentence": SENTENCE})).await;
        assert_eq!(second["data"]["from_cache"], true);
        assert_eq!(tts.calls(), 1);

        let url = second["data"]["audio_url"].as_str().unwrap();
        let request = Request::builder()
            .uri(preview_path(url))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.as_ref(), tts.audio_data());
    }

    #[tokio::test]
    async fn test_unknown_preview_is_not_found() {
        let (app, _) = app();
        let request = Request::builder()
            .uri(format!("/api/audio/preview/{}", uuid::Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["errno"], 404);
    }

    #[tokio::test]
    async fn test_acquire_skips() {
        let (app, tts) = app();

        let empty = post(&app, "/api/audio/acquire", json!({"owner_id": "read", "sentence": "  "})).await;
        assert_eq!(empty["data"]["success"], false);
        assert_eq!(empty["data"]["skipped"], "nothing_to_narrate");

        let cache_only = post(
            &app,
            "/api/audio/acquire",
            json!({"owner_id": "read", "sentence": SENTENCE, "cache_only": true}),
        )
        .await;
        assert_eq!(cache_only["data"]["skipped"], "generation_disabled");
        assert_eq!(tts.calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_is_structured() {
        let (app, tts) = app();
        tts.set_failing(true);

        let body = post(&app, "/api/audio/acquire", json!({"owner_id": "read", "sentence": SENTENCE})).await;
        assert_eq!(body["errno"], 0);
        assert_eq!(body["data"]["success"], false);
        assert_eq!(body["data"]["error_kind"], "unavailable");
        assert!(body["data"]["message"].as_str().unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn test_metadata_and_delete() {
        let (app, _) = app();
        post(&app, "/api/audio/acquire", json!({"owner_id": "read", "sentence": SENTENCE})).await;

        let meta = post(&app, "/api/audio/metadata", json!({"owner_id": "read", "sentence": SENTENCE})).await;
        assert_eq!(meta["data"]["cached"], true);
        assert_eq!(meta["data"]["metadata"]["generationState"]["succeeded"], true);

        let deleted = post(&app, "/api/audio/delete", json!({"owner_id": "read", "sentence": SENTENCE})).await;
        assert_eq!(deleted["errno"], 0);

        let missing = post(&app, "/api/audio/metadata", json!({"owner_id": "read", "sentence": SENTENCE})).await;
        assert_eq!(missing["errno"], 404);
    }

    #[tokio::test]
    async fn test_delete_owner_and_sweep() {
        let (app, _) = app();
        post(&app, "/api/audio/acquire", json!({"owner_id": "read", "sentence": SENTENCE})).await;
        post(&app, "/api/audio/acquire", json!({"owner_id": "read", "sentence": "I read it twice."})).await;

        let removed = post(&app, "/api/audio/delete_owner", json!({"owner_id": "read"})).await;
        assert_eq!(removed["data"]["removed"], 2);

        let invalid = post(&app, "/api/audio/delete_owner", json!({"owner_id": " "})).await;
        assert_eq!(invalid["errno"], 400);

        let swept = post(&app, "/api/audio/sweep", json!({})).await;
        assert_eq!(swept["data"]["removed"], 0);

        let invalid = post(&app, "/api/audio/sweep", json!({"max_age_days": 0})).await;
        assert_eq!(invalid["errno"], 400);
    }

    #[tokio::test]
    async fn test_cache_remote() {
        let (app, _) = app();

        let ok = post(
            &app,
            "/api/audio/cache_remote",
            json!({"owner_id": "read", "sentence": "read", "url": "https://dict.example/read.mp3"}),
        )
        .await;
        assert_eq!(ok["data"]["success"], true);
        assert_eq!(ok["data"]["filename"], "read.mp3");

        let failed = post(
            &app,
            "/api/audio/cache_remote",
            json!({"owner_id": "write", "sentence": "write", "url": "https://dict.example/missing.mp3"}),
        )
        .await;
        assert_eq!(failed["data"]["success"], false);
        assert_eq!(failed["data"]["error_kind"], "rejected");

        let empty_url = post(
            &app,
            "/api/audio/cache_remote",
            json!({"owner_id": "write", "sentence": "write", "url": ""}),
        )
        .await;
        assert_eq!(empty_url["errno"], 400);

        let request = Request::builder().uri("/api/audio/stats").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let stats: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(stats["data"]["total_entries"], 1);
    }

    async fn get_json(app: &Router, uri: &str) -> Value {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_play_then_stop() {
        let (app, tts) = app();

        let playing = post(&app, "/api/audio/play", json!({"owner_id": "read", "sentence": SENTENCE})).await;
        assert_eq!(playing["errno"], 0);
        assert_eq!(playing["data"]["state"], "playing");
        assert_eq!(playing["data"]["retries"], 0);
        assert!(playing["data"]["sample_rate"].is_number());
        assert_eq!(tts.calls(), 1);
        let url = playing["data"]["audio_url"].as_str().unwrap().to_string();

        // acquire/play 返回的地址可以直接交回播放器
        let replay = post(&app, "/api/audio/play", json!({"audio_url": url})).await;
        assert_eq!(replay["data"]["state"], "playing");
        assert_eq!(get_json(&app, "/api/audio/playback").await["data"]["state"], "playing");

        let stopped = post(&app, "/api/audio/stop", json!({})).await;
        assert_eq!(stopped["data"]["state"], "idle");
        assert_eq!(get_json(&app, &preview_path(&url)).await["errno"], 404);
    }

    #[tokio::test]
    async fn test_play_without_sentence_fails_terminally() {
        let (app, tts) = app();

        let stale_url = format!("http://localhost:5060/api/audio/preview/{}", uuid::Uuid::new_v4());
        let stale = post(&app, "/api/audio/play", json!({"audio_url": stale_url})).await;
        assert_eq!(stale["data"]["state"], "failed");
        assert_eq!(stale["data"]["terminal"], true);
        assert_eq!(tts.calls(), 0);

        let invalid = post(&app, "/api/audio/play", json!({"audio_url": "not-a-preview"})).await;
        assert_eq!(invalid["errno"], 400);

        let empty = post(&app, "/api/audio/play", json!({"owner_id": "read"})).await;
        assert_eq!(empty["errno"], 400);
    }
}
