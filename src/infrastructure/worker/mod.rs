//! Worker Layer - 后台任务
//!
//! 实现 SweepWorker，定期清理过期音频

mod sweep_worker;

pub use sweep_worker::{SweepWorker, SweepWorkerConfig};
