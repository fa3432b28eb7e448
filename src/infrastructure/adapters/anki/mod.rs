//! Flashcard Adapter - AnkiConnect 媒体导入

mod anki_connect_client;
mod rate_limiter;

pub use anki_connect_client::{AnkiConnectClient, AnkiConnectConfig, API_VERSION};
pub use rate_limiter::RateLimiter;
