use std::collections::BTreeMap;
use std::time::Duration;

use regex::{NoExpand, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::resolver::AudioResolver;
use crate::domain::serialization::{to_record, CodecError, SIGNATURE, SIGNATURE_KEY, TYPE_KEY};

pub const TAG_GENERATED: &str = "generated";
pub const TAG_UPLOADED: &str = "uploaded";

/// Characters of ad copy spoken per second, used for duration estimates.
const ESTIMATED_CHARS_PER_SECOND: f64 = 15.0;

fn default_voice_id() -> String {
    "6wLJ4Wm2OxvAvetEUBCS".to_string()
}
fn default_voice_display_name() -> String {
    "Charley".to_string()
}
fn default_voice_preview_ref() -> String {
    "male/charley.mp3".to_string()
}
fn default_model_id() -> String {
    "eleven_multilingual_v2".to_string()
}
fn default_emotion_tag() -> String {
    "Neutral".to_string()
}

/// Character count used for billing and duration estimates: apostrophes are
/// stripped and the remainder trimmed before counting.
pub fn compute_char_count(text: &str) -> usize {
    text.replace('\'', "").trim().chars().count()
}

fn split_words(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(' ').map(str::to_owned).collect()
}

/// Which payload variant a section carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Generated,
    Uploaded,
}

/// The data a section carries: a script to be synthesized, or a user-supplied
/// audio asset.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPayload {
    Generated(GeneratedContent),
    Uploaded(UploadedContent),
}

impl ContentPayload {
    pub fn new(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Generated => Self::Generated(GeneratedContent::default()),
            ContentKind::Uploaded => Self::Uploaded(UploadedContent::default()),
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Generated(_) => ContentKind::Generated,
            Self::Uploaded(_) => ContentKind::Uploaded,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Generated(_) => TAG_GENERATED,
            Self::Uploaded(_) => TAG_UPLOADED,
        }
    }

    pub fn notes(&self) -> &str {
        match self {
            Self::Generated(content) => &content.notes,
            Self::Uploaded(content) => &content.notes,
        }
    }

    /// Plain record with an explicit `type` tag. Uploaded audio bytes are
    /// deliberately left out; only the asset name round-trips.
    pub fn serialize(&self) -> Value {
        let mut record = match self {
            Self::Generated(content) => to_record(content),
            Self::Uploaded(content) => to_record(content),
        };
        record.insert(TYPE_KEY.to_owned(), Value::String(self.type_tag().to_owned()));
        record.insert(SIGNATURE_KEY.to_owned(), Value::String(SIGNATURE.to_owned()));
        Value::Object(record)
    }

    pub fn deserialize(value: &Value) -> Result<Self, CodecError> {
        Self::deserialize_with_tag(value.get(TYPE_KEY).and_then(Value::as_str), value)
    }

    /// Reconstructs the variant named by `tag`. Records written before the
    /// type tag existed carry no tag at all; those are generated scripts, so
    /// missing and unknown tags fall back to `Generated`. Compatibility shim
    /// for legacy documents.
    pub(crate) fn deserialize_with_tag(tag: Option<&str>, value: &Value) -> Result<Self, CodecError> {
        match tag {
            Some(TAG_UPLOADED) => Ok(Self::Uploaded(UploadedContent::from_record(value)?)),
            Some(TAG_GENERATED) => Ok(Self::Generated(GeneratedContent::from_record(value)?)),
            other => {
                if let Some(tag) = other {
                    tracing::warn!(tag, "unknown content type tag, treating record as generated");
                }
                Ok(Self::Generated(GeneratedContent::from_record(value)?))
            }
        }
    }

    /// Best-effort enrichment: resolves a playable URL for generated content
    /// from its generation id. Failures are logged and the previous value is
    /// kept; this never propagates an error to the caller.
    pub async fn resolve_playable_url(
        &mut self,
        resolver: &AudioResolver,
        estimated_wait: Duration,
        max_retries: u32,
    ) {
        let Self::Generated(content) = self else {
            return;
        };
        let Some(generation_id) = content.generation_id.clone() else {
            tracing::debug!("generation id not set, skipping audio resolution");
            return;
        };
        match resolver.resolve(&generation_id, estimated_wait, max_retries).await {
            Ok(resolved) => content.resolved_audio_url = Some(resolved.url),
            Err(err) => {
                tracing::warn!(
                    generation_id = %generation_id,
                    error = %err,
                    "failed to resolve playable audio url"
                );
            }
        }
    }
}

/// One word-level emphasis edit, keyed by word index in the script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordTransformation {
    pub original_word: String,
    pub transformed_word: String,
    pub emphasis_action: EmphasisAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmphasisAction {
    EmphasizeLevel1,
    EmphasizeLevel2,
    EmphasizeLevel3,
}

impl EmphasisAction {
    pub fn apply(self, word: &str) -> String {
        match self {
            Self::EmphasizeLevel1 => word.to_uppercase(),
            Self::EmphasizeLevel2 => format!("'{word}'"),
            Self::EmphasizeLevel3 => format!("'{}'", word.to_uppercase()),
        }
    }
}

/// A custom pronunciation substituted into the script right before synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pronunciation {
    pub word: String,
    pub pronunciation: String,
    #[serde(default)]
    pub case_sensitive: bool,
}

/// Script text to be synthesized, with the voice parameters of the take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub current_text: String,
    /// Raw word split of the working text. Indexes into this vector are what
    /// the transformation map is keyed by.
    #[serde(default)]
    pub current_words: Vec<String>,
    #[serde(default)]
    pub current_word_transformations: BTreeMap<usize, WordTransformation>,
    /// Opaque handle from the synthesis backend; None until the first
    /// successful generation.
    #[serde(default)]
    pub generation_id: Option<String>,
    #[serde(default)]
    pub original_char_count: usize,
    #[serde(default)]
    pub current_char_count: usize,
    #[serde(default, deserialize_with = "de_speech_rate")]
    pub speech_rate_percent: i32,
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    #[serde(default = "default_voice_display_name")]
    pub voice_display_name: String,
    #[serde(default = "default_voice_preview_ref")]
    pub voice_preview_ref: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_emotion_tag")]
    pub emotion_tag: String,
    #[serde(default)]
    pub intonation_variability: i32,
    /// Ephemeral playable handle. Round-trips on the wire but is never
    /// trusted after a load; always re-resolved from `generation_id`.
    #[serde(default)]
    pub resolved_audio_url: Option<String>,
    #[serde(default)]
    pub notes: String,
}

impl Default for GeneratedContent {
    fn default() -> Self {
        Self {
            original_text: String::new(),
            current_text: String::new(),
            current_words: Vec::new(),
            current_word_transformations: BTreeMap::new(),
            generation_id: None,
            original_char_count: 0,
            current_char_count: 0,
            speech_rate_percent: 0,
            voice_id: default_voice_id(),
            voice_display_name: default_voice_display_name(),
            voice_preview_ref: default_voice_preview_ref(),
            model_id: default_model_id(),
            emotion_tag: default_emotion_tag(),
            intonation_variability: 0,
            resolved_audio_url: None,
            notes: String::new(),
        }
    }
}

impl GeneratedContent {
    pub fn from_script(text: impl Into<String>) -> Self {
        let text = text.into();
        let char_count = compute_char_count(&text);
        Self {
            current_words: split_words(&text),
            original_text: text.clone(),
            current_text: text,
            original_char_count: char_count,
            current_char_count: char_count,
            ..Self::default()
        }
    }

    pub(crate) fn from_record(value: &Value) -> Result<Self, CodecError> {
        let mut content: Self = serde_json::from_value(value.clone())
            .map_err(|err| CodecError::Malformed(format!("generated content: {err}")))?;
        content.normalize();
        Ok(content)
    }

    /// Char counts are derived data and persisted copies are not trusted;
    /// recompute them from the texts. Word lists written by older clients may
    /// be empty, in which case the original text is split fresh.
    fn normalize(&mut self) {
        self.original_char_count = compute_char_count(&self.original_text);
        self.current_char_count = compute_char_count(&self.current_text);
        if self.current_words.is_empty() {
            self.current_words = split_words(&self.original_text);
        }
        self.intonation_variability = self.intonation_variability.clamp(0, 100);
    }

    /// Replaces the working text and runs the stale-transformation sweep.
    pub fn set_current_text(&mut self, text: impl Into<String>) {
        self.current_text = text.into();
        self.current_char_count = compute_char_count(&self.current_text);
        self.sync_words();
    }

    /// Re-splits the working text and drops transformation entries whose word
    /// index no longer holds the word they were recorded against. Applied
    /// lazily on content change; recorded history snapshots are left alone.
    pub fn sync_words(&mut self) {
        self.current_words = split_words(&self.current_text);
        let words = &self.current_words;
        self.current_word_transformations
            .retain(|index, transformation| {
                words
                    .get(*index)
                    .is_some_and(|word| *word == transformation.original_word)
            });
    }

    pub fn transform_word(&mut self, word_index: usize, action: EmphasisAction) {
        let Some(original_word) = self.current_words.get(word_index) else {
            return;
        };
        let transformed_word = action.apply(original_word);
        self.current_word_transformations.insert(
            word_index,
            WordTransformation {
                original_word: original_word.clone(),
                transformed_word,
                emphasis_action: action,
            },
        );
    }

    pub fn clear_transformation(&mut self, word_index: usize) {
        self.current_word_transformations.remove(&word_index);
    }

    /// The text actually sent for synthesis: the working copy with emphasis
    /// transformations applied, then custom pronunciations substituted in.
    pub fn rendered_script(&self, pronunciations: &[Pronunciation]) -> String {
        let mut script = self.current_text.clone();
        for transformation in self.current_word_transformations.values() {
            script = replace_word(
                &script,
                &transformation.original_word,
                &transformation.transformed_word,
                false,
            );
        }
        for entry in pronunciations {
            script = replace_word(&script, &entry.word, &entry.pronunciation, entry.case_sensitive);
        }
        script
    }

    pub fn estimated_duration_seconds(&self) -> f64 {
        self.current_char_count as f64 / ESTIMATED_CHARS_PER_SECOND
    }
}

fn replace_word(text: &str, word: &str, replacement: &str, case_sensitive: bool) -> String {
    if word.is_empty() {
        return text.to_owned();
    }
    let pattern = format!(r"\b{}\b", regex::escape(word));
    let regex = RegexBuilder::new(&pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .expect("escaped word pattern always compiles");
    regex.replace_all(text, NoExpand(replacement)).into_owned()
}

fn de_speech_rate<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_speech_rate(&value))
}

/// Speech rate predates the percent scale; old documents carry multiplier
/// labels instead of numbers. Anything unrecognized or out of range maps
/// to 0.
fn parse_speech_rate(value: &Value) -> i32 {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|rate| rate as i64))
            .filter(|rate| (-50..=100).contains(rate))
            .unwrap_or(0) as i32,
        Value::String(label) => match label.as_str() {
            "Normal" => 0,
            "1.25x" => 25,
            "1.5x" => 50,
            "1.75x" => 75,
            "2x" => 100,
            other => other
                .parse::<i32>()
                .ok()
                .filter(|rate| (-50..=100).contains(rate))
                .unwrap_or(0),
        },
        _ => 0,
    }
}

/// A user-supplied audio asset. The raw bytes live only in memory; they are
/// never serialized, only the name survives a round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedContent {
    #[serde(default)]
    pub audio_asset_name: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(skip)]
    pub audio_bytes: Option<Vec<u8>>,
}

impl UploadedContent {
    pub fn with_asset(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            audio_asset_name: Some(name.into()),
            notes: String::new(),
            audio_bytes: Some(bytes),
        }
    }

    pub(crate) fn from_record(value: &Value) -> Result<Self, CodecError> {
        serde_json::from_value(value.clone())
            .map_err(|err| CodecError::Malformed(format!("uploaded content: {err}")))
    }

    /// Duration of the in-memory asset, probed from the WAV header. An absent
    /// asset reports zero; malformed audio is an error the caller is expected
    /// to swallow.
    pub fn probe_duration_seconds(&self) -> Result<f64, String> {
        let Some(bytes) = &self.audio_bytes else {
            return Ok(0.0);
        };
        wav_duration_seconds(bytes)
    }
}

fn read_u32_le(bytes: &[u8], offset: usize) -> Option<u32> {
    let chunk: [u8; 4] = bytes.get(offset..offset + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(chunk))
}

fn wav_duration_seconds(bytes: &[u8]) -> Result<f64, String> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err("not a RIFF/WAVE stream".to_owned());
    }
    let mut byte_rate = None;
    let mut offset = 12;
    while offset + 8 <= bytes.len() {
        let chunk_id = &bytes[offset..offset + 4];
        let chunk_size =
            read_u32_le(bytes, offset + 4).ok_or_else(|| "truncated chunk header".to_owned())? as usize;
        let data_start = offset + 8;
        match chunk_id {
            b"fmt " => {
                let rate = read_u32_le(bytes, data_start + 8)
                    .ok_or_else(|| "truncated fmt chunk".to_owned())?;
                if rate == 0 {
                    return Err("fmt chunk reports zero byte rate".to_owned());
                }
                byte_rate = Some(f64::from(rate));
            }
            b"data" => {
                let rate = byte_rate.ok_or_else(|| "data chunk before fmt chunk".to_owned())?;
                return Ok(chunk_size as f64 / rate);
            }
            _ => {}
        }
        // chunks are word-aligned
        offset = data_start + chunk_size + (chunk_size & 1);
    }
    Err("no data chunk found".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_char_count_strips_apostrophes_and_trims() {
        assert_eq!(compute_char_count("don't stop"), 9);
        assert_eq!(compute_char_count("  padded  "), 6);
        assert_eq!(compute_char_count(""), 0);
    }

    #[test]
    fn test_generated_round_trip_preserves_fields() {
        let mut content = GeneratedContent::from_script("buy one get one free");
        content.generation_id = Some("gen_123".to_owned());
        content.emotion_tag = "Excited".to_owned();
        content.speech_rate_percent = 25;
        content.notes = "client liked this take".to_owned();
        content.resolved_audio_url = Some("audio://gen_123".to_owned());
        content.transform_word(1, EmphasisAction::EmphasizeLevel1);
        let payload = ContentPayload::Generated(content);

        let restored = ContentPayload::deserialize(&payload.serialize()).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn test_uploaded_round_trip_keeps_name_not_bytes() {
        let payload =
            ContentPayload::Uploaded(UploadedContent::with_asset("jingle.wav", vec![1, 2, 3]));
        let record = payload.serialize();
        assert!(record.get("audioBytes").is_none());

        let restored = ContentPayload::deserialize(&record).unwrap();
        let ContentPayload::Uploaded(uploaded) = restored else {
            panic!("expected uploaded variant");
        };
        assert_eq!(uploaded.audio_asset_name.as_deref(), Some("jingle.wav"));
        assert_eq!(uploaded.audio_bytes, None);
    }

    #[test]
    fn test_missing_type_tag_deserializes_as_generated() {
        let record = json!({
            "originalText": "hello there",
            "currentText": "hello there",
        });
        let payload = ContentPayload::deserialize(&record).unwrap();
        assert_eq!(payload.kind(), ContentKind::Generated);
    }

    #[test]
    fn test_unknown_type_tag_falls_back_to_generated() {
        let record = json!({ "type": "hologram", "currentText": "hi" });
        let payload = ContentPayload::deserialize(&record).unwrap();
        assert_eq!(payload.kind(), ContentKind::Generated);
    }

    #[test]
    fn test_deserialize_recomputes_char_counts() {
        let record = json!({
            "type": "generated",
            "originalText": "don't stop",
            "currentText": "don't stop now",
            "originalCharCount": 999,
            "currentCharCount": 999,
        });
        let ContentPayload::Generated(content) = ContentPayload::deserialize(&record).unwrap()
        else {
            panic!("expected generated variant");
        };
        assert_eq!(content.original_char_count, 9);
        assert_eq!(content.current_char_count, 13);
        assert_eq!(content.current_words, vec!["don't", "stop"]);
    }

    #[test]
    fn test_legacy_speech_rate_labels() {
        for (label, expected) in [("Normal", 0), ("1.25x", 25), ("1.5x", 50), ("1.75x", 75), ("2x", 100)] {
            let record = json!({ "type": "generated", "speechRatePercent": label });
            let ContentPayload::Generated(content) =
                ContentPayload::deserialize(&record).unwrap()
            else {
                panic!("expected generated variant");
            };
            assert_eq!(content.speech_rate_percent, expected, "label {label}");
        }

        let out_of_range = json!({ "type": "generated", "speechRatePercent": 400 });
        let ContentPayload::Generated(content) =
            ContentPayload::deserialize(&out_of_range).unwrap()
        else {
            panic!("expected generated variant");
        };
        assert_eq!(content.speech_rate_percent, 0);
    }

    #[test]
    fn test_sync_words_drops_stale_transformations() {
        let mut content = GeneratedContent::from_script("big summer blowout sale");
        content.transform_word(1, EmphasisAction::EmphasizeLevel1);
        content.transform_word(3, EmphasisAction::EmphasizeLevel2);
        assert_eq!(content.current_word_transformations.len(), 2);

        // "summer" keeps its slot, "sale" moves and its entry goes stale
        content.set_current_text("big summer sale");
        assert_eq!(content.current_word_transformations.len(), 1);
        assert_eq!(
            content.current_word_transformations[&1].original_word,
            "summer"
        );
    }

    #[test]
    fn test_rendered_script_applies_transformations_and_pronunciations() {
        let mut content = GeneratedContent::from_script("visit acme today");
        content.transform_word(2, EmphasisAction::EmphasizeLevel1);
        let pronunciations = vec![Pronunciation {
            word: "acme".to_owned(),
            pronunciation: "ack-mee".to_owned(),
            case_sensitive: false,
        }];
        assert_eq!(
            content.rendered_script(&pronunciations),
            "visit ack-mee TODAY"
        );
    }

    #[test]
    fn test_clone_does_not_alias() {
        let original = ContentPayload::Uploaded(UploadedContent::with_asset("a.wav", vec![7; 16]));
        let mut cloned = original.clone();
        assert_eq!(cloned, original);

        let ContentPayload::Uploaded(uploaded) = &mut cloned else {
            panic!("expected uploaded variant");
        };
        uploaded.audio_bytes.as_mut().unwrap()[0] = 0;
        assert_ne!(cloned, original);
    }

    #[test]
    fn test_wav_probe_reads_duration() {
        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&36u32.to_le_bytes());
        wav.extend_from_slice(b"WAVE");
        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes()); // pcm
        wav.extend_from_slice(&1u16.to_le_bytes()); // mono
        wav.extend_from_slice(&8000u32.to_le_bytes()); // sample rate
        wav.extend_from_slice(&16000u32.to_le_bytes()); // byte rate
        wav.extend_from_slice(&2u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&32000u32.to_le_bytes());
        wav.extend_from_slice(&vec![0u8; 32]); // truncated body is fine for the probe

        let uploaded = UploadedContent::with_asset("spot.wav", wav);
        assert_eq!(uploaded.probe_duration_seconds().unwrap(), 2.0);
    }

    #[test]
    fn test_wav_probe_rejects_garbage() {
        let uploaded = UploadedContent::with_asset("spot.mp3", vec![0xff; 64]);
        assert!(uploaded.probe_duration_seconds().is_err());

        let empty = UploadedContent::default();
        assert_eq!(empty.probe_duration_seconds().unwrap(), 0.0);
    }
}
