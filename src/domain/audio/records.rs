//! Audio Context - 存储记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AudioPayload, AudioRef, GenerationState};
use crate::domain::sentence::CacheKey;

/// Blob Store 条目
///
/// 不变量:
/// - `origin_id` 只是来源信息，不参与键的计算
/// - `content_md5` 与 `payload` 字节一致，不一致视为损坏
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioRecord {
    pub key: CacheKey,
    pub origin_id: String,
    pub source_text: String,
    pub payload: AudioPayload,
    pub created_at: DateTime<Utc>,
    pub content_md5: String,
}

impl AudioRecord {
    pub fn new(
        key: CacheKey,
        origin_id: impl Into<String>,
        source_text: impl Into<String>,
        payload: AudioPayload,
        created_at: DateTime<Utc>,
    ) -> Self {
        let content_md5 = payload.content_md5();
        Self {
            key,
            origin_id: origin_id.into(),
            source_text: source_text.into(),
            payload,
            created_at,
            content_md5,
        }
    }

    /// 校验负载摘要
    pub fn is_intact(&self) -> bool {
        self.payload.content_md5() == self.content_md5
    }
}

/// Flat Store 中的音频元数据（JSON）
///
/// `preview_reference` 只是会话内的临时引用，重启后不可信；
/// 字节以 Blob Store 为准，文件名与生成状态以本记录为准
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub key: String,
    #[serde(default)]
    pub filename: Option<String>,
    pub example_sentence: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub generation_state: GenerationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_reference: Option<AudioRef>,
    /// 毫秒时间戳
    pub timestamp: i64,
}

impl MetadataRecord {
    pub fn new(
        key: impl Into<String>,
        example_sentence: impl Into<String>,
        generation_state: GenerationState,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            filename: None,
            example_sentence: example_sentence.into(),
            owner_id: None,
            generation_state,
            preview_reference: None,
            timestamp: timestamp.timestamp_millis(),
        }
    }

    pub fn with_filename(mut self, filename: Option<String>) -> Self {
        self.filename = filename;
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_preview(mut self, preview: Option<AudioRef>) -> Self {
        self.preview_reference = preview;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_integrity() {
        let payload = AudioPayload::new(vec![9, 9, 9], "audio/mpeg");
        let mut record = AudioRecord::new(
            CacheKey::from_normalized("a sentence."),
            "card1",
            "A sentence.",
            payload,
            Utc::now(),
        );
        assert!(record.is_intact());

        record.content_md5 = "0".repeat(32);
        assert!(!record.is_intact());
    }

    #[test]
    fn test_metadata_json_shape() {
        let record = MetadataRecord::new(
            "audio_meta:a sentence.",
            "A sentence.",
            GenerationState::succeeded(),
            Utc::now(),
        )
        .with_filename(Some("a_example_nova.mp3".to_string()));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["filename"], "a_example_nova.mp3");
        assert_eq!(json["exampleSentence"], "A sentence.");
        assert_eq!(json["generationState"]["succeeded"], true);
        assert!(json.get("previewReference").is_none());

        let back: MetadataRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
