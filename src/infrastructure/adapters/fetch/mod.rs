//! Fetch Adapter - 远程音频下载

mod http_audio_fetcher;

pub use http_audio_fetcher::HttpAudioFetcher;
