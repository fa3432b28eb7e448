//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod anki;
pub mod fetch;
pub mod probe;
pub mod tts;

pub use anki::*;
pub use fetch::*;
pub use probe::*;
pub use tts::*;
