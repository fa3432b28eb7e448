//! 应用层 - 查询（读操作）
//!
//! CQRS 查询侧：元数据、预览、统计

mod audio_queries;

pub mod handlers;

pub use audio_queries::*;
