//! Conversion between the in-memory section graph and the plain document
//! tree the store persists. Sections and their histories travel as two
//! index-aligned arrays on the wire; everything else in the feature-state
//! blob round-trips verbatim.

use serde_json::{Map, Value};

use crate::domain::section::{HistoryStore, Section};

/// Discriminant field stamped onto every record with a custom codec. Checked
/// before any generic handling so typed records are never decoded as plain
/// data. The value is inherited from documents written by earlier clients.
pub const SIGNATURE_KEY: &str = "signature";
pub const SIGNATURE: &str = "fsCustomClass";
pub const TYPE_KEY: &str = "type";

pub const SECTIONS_KEY: &str = "sectionsArray";
pub const SECTION_HISTORY_KEY: &str = "sectionHistoryArray";

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed record: {0}")]
    Malformed(String),
}

pub fn is_tagged_record(value: &Value) -> bool {
    value.get(SIGNATURE_KEY).and_then(Value::as_str) == Some(SIGNATURE)
}

pub(crate) fn to_record<T: serde::Serialize>(value: &T) -> Map<String, Value> {
    let record = serde_json::to_value(value).expect("record types serialize without error");
    match record {
        Value::Object(record) => record,
        _ => unreachable!("record types serialize to objects"),
    }
}

/// Builds the persisted `featureSpecificStates` record: the serialized
/// section sequence, the index-aligned history array derived from each
/// section's own archive, and the passthrough entries of `extra` verbatim.
pub fn serialize_feature_states(sections: &[Section], extra: &Map<String, Value>) -> Value {
    let mut record = extra.clone();
    record.insert(
        SECTIONS_KEY.to_owned(),
        Value::Array(sections.iter().map(Section::serialize).collect()),
    );
    record.insert(
        SECTION_HISTORY_KEY.to_owned(),
        Value::Array(sections.iter().map(|section| section.history.serialize()).collect()),
    );
    Value::Object(record)
}

/// Inverse of [`serialize_feature_states`]: decodes the two typed arrays,
/// zips each history back into its section, and returns the remaining
/// entries untouched. A missing or short history array leaves the affected
/// sections with empty archives; surplus history entries are dropped.
pub fn deserialize_feature_states(
    value: &Value,
) -> Result<(Vec<Section>, Map<String, Value>), CodecError> {
    if value.is_null() {
        tracing::warn!("feature states missing, starting from an empty section list");
        return Ok((Vec::new(), Map::new()));
    }
    let record = value
        .as_object()
        .ok_or_else(|| CodecError::Malformed("feature states record is not an object".to_owned()))?;

    let mut extra = record.clone();
    let sections_value = extra.remove(SECTIONS_KEY);
    let history_value = extra.remove(SECTION_HISTORY_KEY);

    let mut sections = match sections_value {
        Some(Value::Array(items)) => {
            let mut sections = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                if !is_tagged_record(item) {
                    tracing::debug!(index, "section record missing signature, attempting legacy decode");
                }
                sections.push(Section::deserialize(item)?);
            }
            sections
        }
        Some(_) => {
            return Err(CodecError::Malformed(format!("{SECTIONS_KEY} is not an array")));
        }
        None => {
            tracing::warn!("{} missing from feature states", SECTIONS_KEY);
            Vec::new()
        }
    };

    let histories = match history_value {
        Some(Value::Array(items)) => items
            .iter()
            .map(HistoryStore::deserialize)
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(CodecError::Malformed(format!(
                "{SECTION_HISTORY_KEY} is not an array"
            )));
        }
        None => Vec::new(),
    };

    if histories.len() > sections.len() {
        tracing::warn!(
            sections = sections.len(),
            histories = histories.len(),
            "more history entries than sections, dropping extras"
        );
    }
    for (section, history) in sections.iter_mut().zip(histories) {
        section.history = history;
    }

    Ok((sections, extra))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::content::{ContentKind, ContentPayload, GeneratedContent};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn generated_section(position: usize, script: &str) -> Section {
        let mut section = Section::new(position, ContentKind::Generated);
        section.content = ContentPayload::Generated(GeneratedContent::from_script(script));
        section
    }

    #[test]
    fn test_feature_states_round_trip_with_histories() {
        let mut first = generated_section(0, "opening line");
        let first_snapshot = first.clone();
        first.history.record("gen_a", &first_snapshot);
        let second = generated_section(1, "closing line");
        let mut extra = Map::new();
        extra.insert("musicTrack".to_owned(), json!("upbeat-01"));

        let record = serialize_feature_states(&[first.clone(), second.clone()], &extra);
        let (sections, restored_extra) = deserialize_feature_states(&record).unwrap();

        assert_eq!(sections, vec![first, second]);
        assert_eq!(restored_extra, extra);
    }

    #[test]
    fn test_sections_and_histories_stay_index_aligned_on_the_wire() {
        let mut first = generated_section(0, "a");
        let first_snapshot = first.clone();
        first.history.record("gen_a", &first_snapshot);
        let second = generated_section(1, "b");

        let record = serialize_feature_states(&[first, second], &Map::new());
        let histories = record[SECTION_HISTORY_KEY].as_array().unwrap();
        assert_eq!(histories.len(), 2);
        assert!(histories[0].as_object().unwrap().contains_key("gen_a"));
        assert!(histories[1].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_missing_history_array_yields_empty_archives() {
        let record = json!({
            (SECTIONS_KEY): [generated_section(0, "solo").serialize()],
        });
        let (sections, _) = deserialize_feature_states(&record).unwrap();
        assert_eq!(sections.len(), 1);
        assert!(sections[0].history.is_empty());
    }

    #[test]
    fn test_surplus_history_entries_are_dropped() {
        let mut orphan = HistoryStore::default();
        orphan.record("gen_x", &generated_section(0, "orphaned"));
        let record = json!({
            (SECTIONS_KEY): [generated_section(0, "only").serialize()],
            (SECTION_HISTORY_KEY): [HistoryStore::default().serialize(), orphan.serialize()],
        });
        let (sections, _) = deserialize_feature_states(&record).unwrap();
        assert_eq!(sections.len(), 1);
        assert!(sections[0].history.is_empty());
    }

    #[test]
    fn test_missing_sections_array_tolerated() {
        let (sections, extra) = deserialize_feature_states(&json!({ "musicTrack": "calm" })).unwrap();
        assert!(sections.is_empty());
        assert_eq!(extra["musicTrack"], json!("calm"));
    }

    #[test]
    fn test_non_object_feature_states_rejected() {
        assert!(deserialize_feature_states(&json!(42)).is_err());
        assert!(deserialize_feature_states(&json!({ (SECTIONS_KEY): "oops" })).is_err());
    }

    #[test]
    fn test_tagged_record_detection() {
        let section = generated_section(0, "tagged");
        assert!(is_tagged_record(&section.serialize()));
        assert!(is_tagged_record(&section.content.serialize()));
        assert!(!is_tagged_record(&json!({ "plain": true })));
    }
}
