//! Sled-based Blob Store Implementation
//!
//! Trees:
//! - `records`: CacheKey → bincode(StoredRecord)
//! - `by_origin`: `origin\0key` → key
//! - `by_created`: 大端毫秒时间戳 + key → key
//! - `meta`: schema_version
//!
//! 记录与两个索引在同一个事务中更新

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::application::ports::{BlobStoreError, BlobStorePort, BlobStoreStats, Clock};
use crate::domain::{derive_key, AudioPayload, AudioRecord, CacheKey};

/// 当前 schema 版本
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Sled Blob Store 配置
#[derive(Debug, Clone)]
pub struct SledBlobStoreConfig {
    /// 数据库路径
    pub db_path: String,
}

impl Default for SledBlobStoreConfig {
    fn default() -> Self {
        Self {
            db_path: "data/audio.sled".to_string(),
        }
    }
}

/// 持久化的条目（键不重复存储）
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    origin_id: String,
    source_text: String,
    payload: AudioPayload,
    created_at: DateTime<Utc>,
    content_md5: String,
}

impl StoredRecord {
    fn from_record(record: &AudioRecord) -> Self {
        Self {
            origin_id: record.origin_id.clone(),
            source_text: record.source_text.clone(),
            payload: record.payload.clone(),
            created_at: record.created_at,
            content_md5: record.content_md5.clone(),
        }
    }

    fn into_record(self, key: CacheKey) -> AudioRecord {
        AudioRecord {
            key,
            origin_id: self.origin_id,
            source_text: self.source_text,
            payload: self.payload,
            created_at: self.created_at,
            content_md5: self.content_md5,
        }
    }
}

fn origin_index_key(origin_id: &str, key: &CacheKey) -> Vec<u8> {
    let mut index = origin_prefix(origin_id);
    index.extend_from_slice(key.as_str().as_bytes());
    index
}

fn origin_prefix(origin_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(origin_id.len() + 1);
    prefix.extend_from_slice(origin_id.as_bytes());
    prefix.push(0);
    prefix
}

fn created_index_key(created_at: DateTime<Utc>, key: &CacheKey) -> Vec<u8> {
    let millis = created_at.timestamp_millis().max(0) as u64;
    let mut index = Vec::with_capacity(8 + key.as_str().len());
    index.extend_from_slice(&millis.to_be_bytes());
    index.extend_from_slice(key.as_str().as_bytes());
    index
}

fn db_err(e: sled::Error) -> BlobStoreError {
    BlobStoreError::DatabaseError(e.to_string())
}

fn tx_err(e: TransactionError<BlobStoreError>) -> BlobStoreError {
    match e {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => db_err(e),
    }
}

/// Sled Blob Store
pub struct SledBlobStore {
    db: Db,
    records: Tree,
    by_origin: Tree,
    by_created: Tree,
    clock: Arc<dyn Clock>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl SledBlobStore {
    /// 打开（或创建）存储
    pub fn open(config: &SledBlobStoreConfig, clock: Arc<dyn Clock>) -> Result<Self, BlobStoreError> {
        let db = sled::open(&config.db_path).map_err(db_err)?;
        let store = Self::from_db(db, clock)?;

        tracing::info!(
            db_path = %config.db_path,
            entries = store.records.len(),
            "SledBlobStore initialized"
        );

        Ok(store)
    }

    /// 临时存储，进程退出即删除
    pub fn temporary(clock: Arc<dyn Clock>) -> Result<Self, BlobStoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(db_err)?;
        Self::from_db(db, clock)
    }

    fn from_db(db: Db, clock: Arc<dyn Clock>) -> Result<Self, BlobStoreError> {
        Self::check_schema(&db)?;

        Ok(Self {
            records: db.open_tree("records").map_err(db_err)?,
            by_origin: db.open_tree("by_origin").map_err(db_err)?,
            by_created: db.open_tree("by_created").map_err(db_err)?,
            db,
            clock,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        })
    }

    fn check_schema(db: &Db) -> Result<(), BlobStoreError> {
        let meta = db.open_tree("meta").map_err(db_err)?;

        match meta.get(SCHEMA_VERSION_KEY).map_err(db_err)? {
            Some(raw) => {
                let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| {
                    BlobStoreError::SerializationError("malformed schema version".to_string())
                })?;
                let found = u32::from_be_bytes(bytes);
                if found > SCHEMA_VERSION {
                    return Err(BlobStoreError::SchemaVersion {
                        found,
                        supported: SCHEMA_VERSION,
                    });
                }
            }
            None => {
                meta.insert(SCHEMA_VERSION_KEY, &SCHEMA_VERSION.to_be_bytes()[..])
                    .map_err(db_err)?;
            }
        }

        Ok(())
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 刷新数据库
    pub fn flush(&self) -> Result<(), BlobStoreError> {
        self.db.flush().map_err(db_err)?;
        Ok(())
    }

    fn try_put(&self, record: &AudioRecord) -> Result<(), BlobStoreError> {
        let key = &record.key;
        let value = bincode::serialize(&StoredRecord::from_record(record))
            .map_err(|e| BlobStoreError::SerializationError(e.to_string()))?;
        let origin_index = origin_index_key(&record.origin_id, key);
        let created_index = created_index_key(record.created_at, key);

        (&self.records, &self.by_origin, &self.by_created)
            .transaction(|(records, by_origin, by_created)| {
                if let Some(old) = records.get(key.as_str())? {
                    if let Ok(old) = bincode::deserialize::<StoredRecord>(&old) {
                        by_origin.remove(origin_index_key(&old.origin_id, key))?;
                        by_created.remove(created_index_key(old.created_at, key))?;
                    }
                }
                records.insert(key.as_str(), value.as_slice())?;
                by_origin.insert(origin_index.as_slice(), key.as_str())?;
                by_created.insert(created_index.as_slice(), key.as_str())?;
                Ok::<_, ConflictableTransactionError<BlobStoreError>>(())
            })
            .map_err(tx_err)
    }

    fn try_get(&self, key: &CacheKey) -> Result<Option<AudioRecord>, BlobStoreError> {
        let Some(raw) = self.records.get(key.as_str()).map_err(db_err)? else {
            return Ok(None);
        };
        let stored: StoredRecord = bincode::deserialize(&raw)
            .map_err(|e| BlobStoreError::SerializationError(e.to_string()))?;
        Ok(Some(stored.into_record(key.clone())))
    }

    /// 删除记录及其索引；`created_before` 给定时只删除早于该时间创建的记录
    fn try_remove(
        &self,
        key: &CacheKey,
        created_before: Option<DateTime<Utc>>,
    ) -> Result<bool, BlobStoreError> {
        (&self.records, &self.by_origin, &self.by_created)
            .transaction(|(records, by_origin, by_created)| {
                let Some(raw) = records.get(key.as_str())? else {
                    return Ok(false);
                };

                // 无法解析的记录索引未知，只删除记录本身
                if let Ok(old) = bincode::deserialize::<StoredRecord>(&raw) {
                    if let Some(cutoff) = created_before {
                        if old.created_at >= cutoff {
                            return Ok(false);
                        }
                    }
                    by_origin.remove(origin_index_key(&old.origin_id, key))?;
                    by_created.remove(created_index_key(old.created_at, key))?;
                }

                records.remove(key.as_str())?;
                Ok::<_, ConflictableTransactionError<BlobStoreError>>(true)
            })
            .map_err(tx_err)
    }

    fn try_keys_by_origin(&self, origin_id: &str) -> Result<Vec<CacheKey>, BlobStoreError> {
        self.by_origin
            .scan_prefix(origin_prefix(origin_id))
            .values()
            .map(|value| {
                let value = value.map_err(db_err)?;
                String::from_utf8(value.to_vec())
                    .map(CacheKey::from_normalized)
                    .map_err(|e| BlobStoreError::SerializationError(e.to_string()))
            })
            .collect()
    }

    fn try_sweep(&self, cutoff: DateTime<Utc>) -> Result<usize, BlobStoreError> {
        let cutoff_millis = cutoff.timestamp_millis().max(0) as u64;
        let mut expired = Vec::new();

        for item in self.by_created.iter() {
            let (index, value) = item.map_err(db_err)?;
            let millis = index
                .get(..8)
                .and_then(|b| <[u8; 8]>::try_from(b).ok())
                .map(u64::from_be_bytes)
                .unwrap_or(0);
            if millis > cutoff_millis {
                break;
            }
            match String::from_utf8(value.to_vec()) {
                Ok(key) => expired.push(CacheKey::from_normalized(key)),
                Err(_) => {
                    self.by_created.remove(&index).map_err(db_err)?;
                }
            }
        }

        let mut removed = 0;
        for key in expired {
            if self.try_remove(&key, Some(cutoff))? {
                removed += 1;
            } else {
                // 记录已不存在时清理残留索引
                if !self.records.contains_key(key.as_str()).map_err(db_err)? {
                    let stale: Vec<_> = self
                        .by_created
                        .iter()
                        .keys()
                        .filter_map(Result::ok)
                        .filter(|k| k.get(8..) == Some(key.as_str().as_bytes()))
                        .collect();
                    for k in stale {
                        self.by_created.remove(k).map_err(db_err)?;
                    }
                }
            }
        }

        Ok(removed)
    }

    fn discard_corrupt(&self, key: &CacheKey) {
        if let Err(e) = self.try_remove(key, None) {
            tracing::warn!(key = %key, error = %e, "Failed to discard corrupt audio record");
        }
    }

    fn try_stats(&self) -> Result<(usize, u64), BlobStoreError> {
        let mut total_entries = 0;
        let mut total_size_bytes = 0u64;
        for item in self.records.iter() {
            let (_, raw) = item.map_err(db_err)?;
            total_entries += 1;
            if let Ok(stored) = bincode::deserialize::<StoredRecord>(&raw) {
                total_size_bytes += stored.payload.len() as u64;
            }
        }
        Ok((total_entries, total_size_bytes))
    }
}

#[async_trait]
impl BlobStorePort for SledBlobStore {
    async fn store(
        &self,
        origin_id: &str,
        sentence: &str,
        payload: AudioPayload,
    ) -> Option<CacheKey> {
        let key = derive_key(sentence, origin_id);
        let size = payload.len();
        let record = AudioRecord::new(key.clone(), origin_id, sentence, payload, self.clock.now());

        match self.try_put(&record) {
            Ok(()) => {
                tracing::debug!(key = %key, origin_id = %origin_id, size_bytes = size, "Audio stored");
                Some(key)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to store audio");
                None
            }
        }
    }

    async fn get(&self, origin_id: &str, sentence: &str) -> Option<AudioPayload> {
        let key = derive_key(sentence, origin_id);
        self.get_record(&key).await.map(|record| record.payload)
    }

    async fn get_record(&self, key: &CacheKey) -> Option<AudioRecord> {
        let found = match self.try_get(key) {
            Ok(Some(record)) if record.is_intact() => Some(record),
            Ok(Some(_)) => {
                tracing::warn!(key = %key, "Audio payload digest mismatch, discarding record");
                self.discard_corrupt(key);
                None
            }
            Ok(None) => None,
            Err(BlobStoreError::SerializationError(e)) => {
                tracing::warn!(key = %key, error = %e, "Unreadable audio record, discarding");
                self.discard_corrupt(key);
                None
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read audio");
                None
            }
        };

        if found.is_some() {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    async fn contains(&self, key: &CacheKey) -> bool {
        self.records.contains_key(key.as_str()).unwrap_or_else(|e| {
            tracing::warn!(key = %key, error = %e, "Failed to check audio");
            false
        })
    }

    async fn delete(&self, origin_id: &str, sentence: &str) -> bool {
        let key = derive_key(sentence, origin_id);
        match self.try_remove(&key, None) {
            Ok(removed) => {
                tracing::debug!(key = %key, removed = removed, "Audio deleted");
                true
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to delete audio");
                false
            }
        }
    }

    async fn delete_by_origin(&self, origin_id: &str) -> bool {
        let keys = match self.try_keys_by_origin(origin_id) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(origin_id = %origin_id, error = %e, "Failed to list audio by origin");
                return false;
            }
        };

        let mut ok = true;
        for key in &keys {
            if let Err(e) = self.try_remove(key, None) {
                tracing::warn!(key = %key, error = %e, "Failed to delete audio");
                ok = false;
            }
        }

        tracing::debug!(origin_id = %origin_id, count = keys.len(), "Audio deleted by origin");
        ok
    }

    async fn keys_by_origin(&self, origin_id: &str) -> Vec<CacheKey> {
        self.try_keys_by_origin(origin_id).unwrap_or_else(|e| {
            tracing::warn!(origin_id = %origin_id, error = %e, "Failed to list audio by origin");
            Vec::new()
        })
    }

    async fn sweep_older_than(&self, max_age_days: u32) -> usize {
        let cutoff = self.clock.now() - Duration::days(i64::from(max_age_days));

        match self.try_sweep(cutoff) {
            Ok(removed) => {
                if removed > 0 {
                    tracing::info!(removed = removed, max_age_days = max_age_days, "Expired audio swept");
                }
                removed
            }
            Err(e) => {
                tracing::warn!(error = %e, "Audio sweep failed");
                0
            }
        }
    }

    async fn stats(&self) -> BlobStoreStats {
        let (total_entries, total_size_bytes) = self.try_stats().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to compute audio store stats");
            (0, 0)
        });

        BlobStoreStats {
            total_entries,
            total_size_bytes,
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }
}
