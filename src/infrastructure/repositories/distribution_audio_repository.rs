use async_trait::async_trait;

use super::audio_repository::AudioRepository;

/// Finished renders are published under this prefix of the distribution
/// bucket, keyed by generation id.
const DISTRIBUTION_PREFIX: &str = "primary--distribution";

/// Audio repository reading from the distribution bucket over HTTP.
pub struct DistributionAudioRepository {
    http: reqwest::Client,
    base_url: String,
}

impl DistributionAudioRepository {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn object_url(&self, generation_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            DISTRIBUTION_PREFIX,
            generation_id
        )
    }
}

#[async_trait]
impl AudioRepository for DistributionAudioRepository {
    async fn fetch_by_id(&self, generation_id: &str) -> Result<Vec<u8>, String> {
        let start_time = std::time::Instant::now();
        let url = self.object_url(generation_id);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("distribution request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!(
                "distribution returned status {} for generation {}",
                response.status(),
                generation_id
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("failed to read audio stream: {e}"))?;

        tracing::info!(
            generation_id,
            latency_ms = start_time.elapsed().as_millis() as u64,
            audio_size_bytes = bytes.len(),
            "audio fetched from distribution"
        );

        Ok(bytes.to_vec())
    }
}
