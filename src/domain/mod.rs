//! Domain Layer - 领域层
//!
//! 包含两个限界上下文:
//! - Sentence Context: 例句提取与缓存键派生
//! - Audio Context: 音频负载与存储记录

pub mod audio;
pub mod sentence;

pub use audio::{AudioFormat, AudioPayload, AudioRecord, AudioRef, GenerationState, MetadataRecord};
pub use sentence::{derive_key, extract_example_sentence, CacheKey};
