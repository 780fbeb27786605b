use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::domain::section::Section;
use crate::domain::serialization::CodecError;

/// Per-section archive of past accepted generations, keyed by generation id.
/// Entries are frozen snapshots: recorded once on a successful generation,
/// never mutated afterwards, and pruned only wholesale when the owning
/// section goes away.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryStore {
    entries: HashMap<String, Section>,
}

impl HistoryStore {
    /// Archives a snapshot of `section` under `generation_id`. Re-recording
    /// the same id overwrites the previous snapshot, so a retried generation
    /// is idempotent; last writer wins. The snapshot's own history is emptied
    /// so archives do not nest.
    pub fn record(&mut self, generation_id: impl Into<String>, section: &Section) {
        let mut snapshot = section.clone();
        snapshot.history = HistoryStore::default();
        self.entries.insert(generation_id.into(), snapshot);
    }

    /// A fresh clone of the archived snapshot. The stored instance is never
    /// handed out; callers replace the live section with the returned clone
    /// and the archive stays immutable.
    pub fn restore(&self, generation_id: &str) -> Option<Section> {
        self.entries.get(generation_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn generation_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.entries.iter().map(|(id, section)| (id.as_str(), section))
    }

    pub fn serialize(&self) -> Value {
        let mut record = Map::new();
        for (generation_id, section) in &self.entries {
            record.insert(generation_id.clone(), section.serialize());
        }
        Value::Object(record)
    }

    pub fn deserialize(value: &Value) -> Result<Self, CodecError> {
        let record = value
            .as_object()
            .ok_or_else(|| CodecError::Malformed("history record is not an object".to_owned()))?;
        let mut entries = HashMap::with_capacity(record.len());
        for (generation_id, section_value) in record {
            entries.insert(generation_id.clone(), Section::deserialize(section_value)?);
        }
        Ok(Self { entries })
    }
}
