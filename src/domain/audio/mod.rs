//! Audio Context - 音频限界上下文
//!
//! 职责:
//! - 音频负载与格式
//! - Blob Store / Flat Store 记录
//! - 会话内临时引用

mod records;
mod value_objects;

pub use records::{AudioRecord, MetadataRecord};
pub use value_objects::{AudioFormat, AudioPayload, AudioRef, GenerationState};
