//! Command Handlers 实现
//!
//! 所有 CommandHandler 的具体实现

mod acquire_handlers;
mod maintenance_handlers;

pub use acquire_handlers::*;
pub use maintenance_handlers::*;
