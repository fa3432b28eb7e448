//! Playback - 播放前校验与重试

mod controller;
mod retry;
mod state;

pub use controller::PlaybackController;
pub use retry::RetryPolicy;
pub use state::{PlaybackError, PlaybackRequest, PlaybackState};
