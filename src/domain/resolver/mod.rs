pub mod error;
pub mod service;

pub use error::ResolveError;
pub use service::{estimated_processing_wait, AudioResolver, ResolvedAudio};
