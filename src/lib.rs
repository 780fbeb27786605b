//! Section/content data model and lifecycle for building ad audio spots:
//! construction, persistence round trips, per-section generation history,
//! and best-effort resolution of playable audio.

pub mod domain;
pub mod error;
pub mod infrastructure;
