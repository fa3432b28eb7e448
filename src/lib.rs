//! vocab-audio - 单词卡例句音频缓存
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Sentence Context: 例句提取与缓存键派生
//! - Audio Context: 音频负载、存储记录与元数据
//!
//! 应用层 (application/):
//! - Ports: 端口定义（BlobStore, FlatStore, TtsEngine, MediaImport, AudioFetcher, MediaProbe）
//! - Commands: 获取、远程缓存、删除、清理
//! - Queries: 元数据、预览、统计
//! - Playback: 播放前校验与退避重试
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: 本地 JSON API
//! - Memory: 时钟、预览引用注册表
//! - Worker: SweepWorker 定期清理
//! - Persistence: Sled（音频）+ JSON 文件（元数据）
//! - Adapters: OpenAI TTS, AnkiConnect, 远程下载, 音频探测

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
