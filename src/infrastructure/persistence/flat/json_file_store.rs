//! JSON File Flat Store
//!
//! 整个键值表保存为一个 JSON 对象；每次写入先写临时文件再 rename，
//! 读写都在同一把锁内完成

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::application::ports::{FlatStoreError, FlatStorePort};

pub struct JsonFileFlatStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileFlatStore {
    /// 打开存储文件，不存在时创建空表
    ///
    /// 无法解析的文件会被改名为 `*.corrupt` 后从空表开始
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FlatStoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| FlatStoreError::IoError(e.to_string()))?;
            }
        }

        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    let backup = path.with_extension("corrupt");
                    tracing::warn!(
                        path = %path.display(),
                        backup = %backup.display(),
                        error = %e,
                        "Flat store file is not valid JSON, starting empty"
                    );
                    fs::rename(&path, &backup).map_err(|e| FlatStoreError::IoError(e.to_string()))?;
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(FlatStoreError::IoError(e.to_string())),
        };

        tracing::info!(path = %path.display(), entries = entries.len(), "JsonFileFlatStore initialized");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, FlatStoreError> {
        self.entries
            .lock()
            .map_err(|_| FlatStoreError::IoError("flat store lock poisoned".to_string()))
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), FlatStoreError> {
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| FlatStoreError::SerializationError(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw).map_err(|e| FlatStoreError::IoError(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| FlatStoreError::IoError(e.to_string()))?;
        Ok(())
    }
}

impl FlatStorePort for JsonFileFlatStore {
    fn get(&self, key: &str) -> Result<Option<String>, FlatStoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), FlatStoreError> {
        let mut entries = self.lock()?;
        let previous = entries.insert(key.to_string(), value.to_string());

        // 落盘失败时回滚内存中的修改
        if let Err(e) = self.persist(&entries) {
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), FlatStoreError> {
        let mut entries = self.lock()?;
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.persist(&entries) {
            entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, FlatStoreError> {
        Ok(self
            .lock()?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
