use async_trait::async_trait;

/// Repository for fetching finished audio renders.
/// Abstracts the backend that holds completed generations; the caller only
/// ever hands over the opaque generation id it received when synthesis was
/// requested.
///
/// Implementations are responsible for:
/// - Addressing the generation inside their own storage layout
/// - Returning the full audio stream as one buffer (MP3 or WAV)
#[async_trait]
pub trait AudioRepository: Send + Sync {
    /// Fetch the audio bytes for a completed generation
    ///
    /// # Errors
    /// Returns an error if the generation is still processing, unknown, or
    /// the backend is unavailable. Callers treat all failures alike and
    /// retry within their own bounds.
    async fn fetch_by_id(&self, generation_id: &str) -> Result<Vec<u8>, String>;
}
