use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::section::Section;

/// Top-level keys of the persisted state record.
pub const OWNER_KEY: &str = "ownerUserId";
pub const FEATURE_STATES_KEY: &str = "featureSpecificStates";
pub const SHARED_STATES_KEY: &str = "sharedStates";

/// Keys the lifecycle maintains inside the otherwise opaque shared-state blob.
pub const SHARED_SPOT_ID_KEY: &str = "spotId";
pub const SHARED_SPOT_NAME_KEY: &str = "spotName";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpotMode {
    SingleSpot,
    FullService,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLog {
    pub download_file_name: String,
    pub download_time: DateTime<Utc>,
}

/// The metadata half of a persisted spot. The full state lives in a separate
/// record under the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotMetadata {
    pub owner_user_id: String,
    pub display_name: String,
    pub mode: SpotMode,
    pub created_at: DateTime<Utc>,
    pub last_edited_at: DateTime<Utc>,
    #[serde(default)]
    pub last_downloaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub download_logs: Vec<DownloadLog>,
}

/// Row for the owner's spot listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotSummary {
    pub spot_id: String,
    pub display_name: String,
    pub mode: SpotMode,
    pub created_at: DateTime<Utc>,
    pub last_edited_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_downloaded_at: Option<DateTime<Utc>>,
}

impl SpotSummary {
    pub fn from_metadata(spot_id: String, metadata: SpotMetadata) -> Self {
        Self {
            spot_id,
            display_name: metadata.display_name,
            mode: metadata.mode,
            created_at: metadata.created_at,
            last_edited_at: metadata.last_edited_at,
            last_downloaded_at: metadata.last_downloaded_at,
        }
    }
}

/// A fully loaded spot: metadata, sections with their histories zipped back
/// in and playable URLs re-resolved, plus the UI-owned state blobs verbatim.
#[derive(Debug, Clone)]
pub struct LoadedSpot {
    pub spot_id: String,
    pub metadata: SpotMetadata,
    pub sections: Vec<Section>,
    pub feature_states: Map<String, Value>,
    pub shared_states: Map<String, Value>,
}
