//! Cache Key - 例句缓存键
//!
//! 两个存储（Blob Store / Flat Store）必须使用同一派生函数，保证同一例句的键一致

use serde::{Deserialize, Serialize};

use super::extractor::extract_example_sentence;

/// 例句缓存键
///
/// 不变量:
/// - 只因大小写、首尾空白或音标标注写法不同的例句得到相同的键
/// - 键就是规范化后的文本本身，不同例句不会冲突
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// 从例句派生缓存键
    ///
    /// 例句为空或提取不到内容时退回到调用方提供的标识
    pub fn derive(sentence: &str, fallback_id: &str) -> Self {
        match normalize_sentence(sentence) {
            Some(normalized) => Self(normalized),
            None => {
                tracing::debug!(
                    fallback_id = %fallback_id,
                    "Sentence normalized to nothing, falling back to caller id"
                );
                Self(fallback_id.to_string())
            }
        }
    }

    /// 包装已经规范化的键（从存储读回时使用）
    pub fn from_normalized(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 规范化例句：提取、去标注、小写
pub fn normalize_sentence(sentence: &str) -> Option<String> {
    extract_example_sentence(sentence).map(|s| s.to_lowercase())
}

/// 派生缓存键
pub fn derive_key(sentence: &str, fallback_id: &str) -> CacheKey {
    CacheKey::derive(sentence, fallback_id)
}
