//! In-Memory Flat Store

use dashmap::DashMap;
use std::sync::Arc;

use crate::application::ports::{FlatStoreError, FlatStorePort};

/// 内存键值存储（测试与无持久化运行）
pub struct InMemoryFlatStore {
    entries: DashMap<String, String>,
}

impl InMemoryFlatStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Default for InMemoryFlatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FlatStorePort for InMemoryFlatStore {
    fn get(&self, key: &str) -> Result<Option<String>, FlatStoreError> {
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), FlatStoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), FlatStoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, FlatStoreError> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
