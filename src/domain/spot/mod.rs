pub mod error;
pub mod model;
pub mod service;

pub use error::SpotServiceError;
pub use model::{DownloadLog, LoadedSpot, SpotMetadata, SpotMode, SpotSummary};
pub use service::{SpotService, SpotServiceApi};

use serde_json::{Map, Value};

use crate::domain::section::Section;

/// Request to create a new spot
#[derive(Debug, Clone)]
pub struct CreateSpotRequest {
    pub display_name: String,
    pub mode: SpotMode,
    pub sections: Vec<Section>,
    /// Mode-specific UI state, passed through verbatim next to the section
    /// arrays.
    pub feature_states: Map<String, Value>,
    /// Cross-mode UI state, passed through verbatim. The service maintains
    /// the `spotId` entry itself.
    pub shared_states: Map<String, Value>,
}

/// Request to overwrite the state of an existing spot
#[derive(Debug, Clone, Default)]
pub struct UpdateSpotRequest {
    pub sections: Vec<Section>,
    pub feature_states: Map<String, Value>,
    pub shared_states: Map<String, Value>,
}

impl Default for CreateSpotRequest {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            mode: SpotMode::SingleSpot,
            sections: Vec::new(),
            feature_states: Map::new(),
            shared_states: Map::new(),
        }
    }
}
