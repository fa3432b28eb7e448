//! TTS Adapter - 语音合成客户端实现

mod fake_tts_client;
mod openai_tts_client;

pub use fake_tts_client::{silent_wav, FakeTtsClient, FakeTtsClientConfig};
pub use openai_tts_client::*;
