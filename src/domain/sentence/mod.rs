//! Sentence Context - 例句与缓存键
//!
//! 职责:
//! - 从卡片内容中提取例句
//! - 派生两个存储共用的缓存键

mod cache_key;
mod extractor;

pub use cache_key::{derive_key, normalize_sentence, CacheKey};
pub use extractor::{extract_example_sentence, FRONT_MARKER};
