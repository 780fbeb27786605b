pub mod audio_repository;
pub mod distribution_audio_repository;
pub mod spot_repository;

pub use audio_repository::AudioRepository;
pub use distribution_audio_repository::DistributionAudioRepository;
pub use spot_repository::{
    SpotRepository, SPOTS_LEGACY_COLLECTION, SPOTS_META_COLLECTION, SPOTS_STATE_COLLECTION,
};
