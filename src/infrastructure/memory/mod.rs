//! Memory Layer - In-Memory State Management
//!
//! 进程内状态：时钟、会话内临时音频引用

mod clock;
mod preview_registry;

pub use clock::{ManualClock, SystemClock};
pub use preview_registry::{InMemoryPreviewRegistry, DEFAULT_PREVIEW_CAPACITY};
