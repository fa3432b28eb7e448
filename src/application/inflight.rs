//! In-flight Generations - 同键生成去重
//!
//! 同一缓存键同一时刻只允许一个生成请求；后到的调用方等待前者完成，
//! 然后重新检查缓存

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::CacheKey;

#[derive(Clone, Default)]
pub struct InFlightGenerations {
    slots: Arc<DashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl InFlightGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    /// 占用键；持有返回的 guard 期间其他调用方在此等待
    pub async fn acquire(&self, key: &CacheKey) -> InFlightGuard {
        let slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = slot.lock_owned().await;
        InFlightGuard {
            guard: Some(guard),
            key: key.clone(),
            slots: self.slots.clone(),
        }
    }

    /// 当前有生成在进行或等待的键数量
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

pub struct InFlightGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: CacheKey,
    slots: Arc<DashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        // map 与 guard 各持有一份 Arc；没有等待者时清理槽位
        self.slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) <= 2);
        self.guard.take();
    }
}
