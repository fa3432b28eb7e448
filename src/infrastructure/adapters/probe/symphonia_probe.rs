//! Symphonia Probe - 基于 symphonia 的播放前校验
//!
//! 只探测容器并读取默认轨道的编码参数，不解码音频

use std::io::Cursor;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::application::ports::{MediaInfo, MediaProbePort, ProbeError};
use crate::domain::AudioPayload;

#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaProbe;

impl SymphoniaProbe {
    pub fn new() -> Self {
        Self
    }
}

impl MediaProbePort for SymphoniaProbe {
    fn probe(&self, payload: &AudioPayload) -> Result<MediaInfo, ProbeError> {
        if payload.is_empty() {
            return Err(ProbeError::Empty);
        }

        let cursor = Cursor::new(payload.data().to_vec());
        let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

        let mut hint = Hint::new();
        hint.mime_type(payload.mime_type());
        if let Some(format) = payload.format() {
            hint.with_extension(format.extension());
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| match e {
                SymphoniaError::Unsupported(what) => ProbeError::Unsupported(what.to_string()),
                other => ProbeError::Malformed(format!("Probe failed: {}", other)),
            })?;

        let track = probed
            .format
            .default_track()
            .ok_or_else(|| ProbeError::Malformed("No audio track found".to_string()))?;
        let params = &track.codec_params;

        let codec = symphonia::default::get_codecs()
            .get_codec(params.codec)
            .map(|d| d.short_name.to_string());
        let sample_rate = params.sample_rate;
        let duration_ms = match (params.n_frames, sample_rate) {
            (Some(frames), Some(rate)) if rate > 0 => Some(frames * 1000 / rate as u64),
            _ => None,
        };

        let info = MediaInfo {
            codec,
            sample_rate,
            channels: params.channels.map(|c| c.count()),
            duration_ms,
        };

        tracing::debug!(
            codec = ?info.codec,
            sample_rate = ?info.sample_rate,
            duration_ms = ?info.duration_ms,
            "Audio probed"
        );

        Ok(info)
    }
}
