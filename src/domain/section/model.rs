use serde_json::{json, Value};

use crate::domain::content::{ContentKind, ContentPayload};
use crate::domain::section::history::HistoryStore;
use crate::domain::serialization::{CodecError, SIGNATURE, TYPE_KEY};

const DEFAULT_TRAILING_PAUSE_SECONDS: f64 = 0.2;

/// One ordered unit of ad content. `position_index` must equal the section's
/// array position; after any structural mutation the caller renumbers via
/// [`renumber`].
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub position_index: usize,
    pub content: ContentPayload,
    pub trailing_pause_seconds: f64,
    pub duration_seconds: f64,
    /// Past accepted generations of this section, keyed by generation id.
    /// Owned here rather than held in a parallel array so the two can never
    /// drift out of alignment in memory; the persisted format still carries
    /// the histories as a separate index-aligned array.
    pub history: HistoryStore,
}

impl Section {
    pub fn new(position_index: usize, kind: ContentKind) -> Self {
        Self {
            position_index,
            content: ContentPayload::new(kind),
            trailing_pause_seconds: DEFAULT_TRAILING_PAUSE_SECONDS,
            duration_seconds: 0.0,
            history: HistoryStore::default(),
        }
    }

    /// Recomputes the derived duration from the content. Generated scripts
    /// use the character-rate estimate; uploaded assets are probed, and a
    /// failed probe keeps the previous value.
    pub fn update_duration(&mut self) {
        match &self.content {
            ContentPayload::Generated(content) => {
                self.duration_seconds = content.estimated_duration_seconds();
            }
            ContentPayload::Uploaded(content) => match content.probe_duration_seconds() {
                Ok(duration) => self.duration_seconds = duration,
                Err(err) => {
                    tracing::debug!(error = %err, "audio duration probe failed, keeping previous duration");
                }
            },
        }
    }

    /// Section record for persistence. The history map is not embedded here;
    /// the document codec writes it into the index-aligned history array.
    pub fn serialize(&self) -> Value {
        json!({
            "positionIndex": self.position_index,
            "type": self.content.type_tag(),
            "trailingPauseSeconds": self.trailing_pause_seconds,
            "durationSeconds": self.duration_seconds,
            "content": self.content.serialize(),
            "signature": SIGNATURE,
        })
    }

    pub fn deserialize(value: &Value) -> Result<Self, CodecError> {
        let record = value
            .as_object()
            .ok_or_else(|| CodecError::Malformed("section record is not an object".to_owned()))?;

        // The oldest documents carry the payload fields directly on the
        // section record instead of under a `content` key.
        let content_value = record.get("content").unwrap_or(value);
        let tag = record
            .get(TYPE_KEY)
            .and_then(Value::as_str)
            .or_else(|| content_value.get(TYPE_KEY).and_then(Value::as_str));
        let content = ContentPayload::deserialize_with_tag(tag, content_value)?;

        Ok(Self {
            position_index: record
                .get("positionIndex")
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize,
            content,
            trailing_pause_seconds: record
                .get("trailingPauseSeconds")
                .and_then(Value::as_f64)
                .unwrap_or(DEFAULT_TRAILING_PAUSE_SECONDS),
            duration_seconds: record
                .get("durationSeconds")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            history: HistoryStore::default(),
        })
    }
}

/// Reassigns `position_index = array index` for every section. Callers must
/// invoke this after every insert, delete, or reorder; the index is never
/// fixed up implicitly.
pub fn renumber(sections: &mut [Section]) {
    for (index, section) in sections.iter_mut().enumerate() {
        section.position_index = index;
    }
}
