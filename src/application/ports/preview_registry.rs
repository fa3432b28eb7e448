//! Preview Registry Port - 会话内临时引用
//!
//! 临时引用指向进程内存中的音频字节，重启即失效。
//! 只有缓存键和文件名可以持久化，引用本身不可以。

use uuid::Uuid;

use crate::domain::{AudioPayload, AudioRef, CacheKey};

pub trait PreviewRegistryPort: Send + Sync {
    /// 当前会话 ID，引用中的 session_id 与之不同即为过期引用
    fn session_id(&self) -> Uuid;

    /// 为负载创建临时引用
    fn register(&self, key: &CacheKey, payload: AudioPayload) -> AudioRef;

    /// 解析引用；过期或已撤销返回 None
    fn resolve(&self, audio_ref: &AudioRef) -> Option<AudioPayload>;

    /// 按 token 解析（HTTP 预览）
    fn resolve_token(&self, token: Uuid) -> Option<AudioPayload>;

    /// 撤销引用，返回是否确实撤销了
    fn revoke(&self, audio_ref: &AudioRef) -> bool;

    /// 当前持有的引用数量
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
