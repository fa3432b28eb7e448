//! Clock Port - 时间来源
//!
//! 存储的创建时间与按年龄清理都从这里取时间，测试中可替换为手动时钟

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
