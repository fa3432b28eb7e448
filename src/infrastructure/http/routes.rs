//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping                      GET   健康检查
//! - /api/audio/acquire             POST  获取例句音频（查缓存，必要时生成）
//! - /api/audio/cache_remote        POST  缓存远程音频
//! - /api/audio/metadata            POST  查询元数据（读时修复）
//! - /api/audio/delete              POST  删除单条音频
//! - /api/audio/delete_owner        POST  删除某个单词的全部音频
//! - /api/audio/sweep               POST  按年龄清理
//! - /api/audio/stats               GET   缓存统计
//! - /api/audio/preview/{token}     GET   按临时引用取音频字节
//! - /api/audio/play                POST  加载并校验音频（失败按策略重试）
//! - /api/audio/playback            GET   当前播放状态
//! - /api/audio/stop                POST  停止播放

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new().nest("/api", api_routes())
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/audio", audio_routes())
}

/// Audio 路由
fn audio_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/acquire", post(handlers::acquire_audio))
        .route("/cache_remote", post(handlers::cache_remote_audio))
        .route("/metadata", post(handlers::get_audio_metadata))
        .route("/delete", post(handlers::delete_audio))
        .route("/delete_owner", post(handlers::delete_owner_audio))
        .route("/sweep", post(handlers::sweep_audio))
        .route("/stats", get(handlers::cache_stats))
        .route("/preview/:token", get(handlers::preview_audio))
        .route("/play", post(handlers::play_audio))
        .route("/playback", get(handlers::playback_state))
        .route("/stop", post(handlers::stop_playback))
}
