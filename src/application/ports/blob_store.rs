//! Blob Store Port - 音频二进制缓存
//!
//! 定义音频二进制缓存的抽象接口，具体实现使用 Sled
//!
//! 这是尽力而为的缓存：底层存储不可用时所有操作退化为 未命中 / false / 0，
//! 错误只记录日志，不向调用方传播

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{AudioPayload, AudioRecord, CacheKey};

/// Blob Store 错误（仅在实现内部和打开存储时使用）
#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Unsupported schema version: found {found}, supported {supported}")]
    SchemaVersion { found: u32, supported: u32 },
}

/// Blob Store 统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobStoreStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}

/// Blob Store Port
///
/// - 键: `derive_key(sentence, origin_id)`，origin_id 只在例句为空时参与
/// - origin_id 作为来源元数据保存，可按来源批量删除
/// - 同一键并发写入为 last-write-wins
#[async_trait]
pub trait BlobStorePort: Send + Sync {
    /// 存储音频（覆盖已有条目），返回使用的键；写入失败返回 None
    async fn store(
        &self,
        origin_id: &str,
        sentence: &str,
        payload: AudioPayload,
    ) -> Option<CacheKey>;

    /// 读取音频，未命中返回 None
    async fn get(&self, origin_id: &str, sentence: &str) -> Option<AudioPayload>;

    /// 按键读取完整记录
    async fn get_record(&self, key: &CacheKey) -> Option<AudioRecord>;

    /// 键是否存在；不计入命中统计
    async fn contains(&self, key: &CacheKey) -> bool;

    /// 删除单条记录；条目不存在也返回 true
    async fn delete(&self, origin_id: &str, sentence: &str) -> bool;

    /// 删除某个来源的所有记录
    async fn delete_by_origin(&self, origin_id: &str) -> bool;

    /// 列出某个来源的所有键
    async fn keys_by_origin(&self, origin_id: &str) -> Vec<CacheKey>;

    /// 删除创建时间早于 `now - max_age_days` 的记录，返回删除数量
    async fn sweep_older_than(&self, max_age_days: u32) -> usize;

    /// 获取统计信息
    async fn stats(&self) -> BlobStoreStats;
}
