use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use super::error::ResolveError;
use crate::infrastructure::repositories::AudioRepository;

/// Observed synthesis throughput of the audio backend; drives the wait
/// heuristic before the first fetch of a fresh generation.
const SYNTHESIS_CHARS_PER_SECOND: f64 = 15.2;
const PROCESSING_SLACK: Duration = Duration::from_secs(6);

const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(15);

/// How long the backend is presumed to still be processing a generation of
/// `char_count` characters. Used as the `estimated_wait` for a resolution
/// kicked off right after requesting synthesis.
pub fn estimated_processing_wait(char_count: usize) -> Duration {
    Duration::from_secs_f64(char_count as f64 / SYNTHESIS_CHARS_PER_SECOND) + PROCESSING_SLACK
}

/// A resolved generation: a locally addressable handle plus the fetched
/// audio bytes.
#[derive(Debug, Clone)]
pub struct ResolvedAudio {
    pub url: String,
    pub bytes: Arc<Vec<u8>>,
}

/// Resolves a generation id to playable audio, waiting out the backend's
/// estimated processing time and retrying on a fixed interval up to a bound.
pub struct AudioResolver {
    audio_repo: Arc<dyn AudioRepository>,
    cache: Option<Cache<String, ResolvedAudio>>,
    retry_interval: Duration,
}

impl AudioResolver {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    pub fn new(audio_repo: Arc<dyn AudioRepository>, cache_enabled: bool) -> Self {
        let cache = if cache_enabled {
            Some(
                Cache::builder()
                    .max_capacity(100)
                    .time_to_idle(Duration::from_secs(30 * 60)) // 30 minutes, refreshes on access
                    .build(),
            )
        } else {
            None
        };

        Self {
            audio_repo,
            cache,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Resolution flow per attempt: wait out `estimated_wait`, fetch, and on
    /// failure sleep the fixed inter-retry interval before the next attempt.
    /// Attempts are strictly bounded by `max_retries` (a bound of zero still
    /// permits one attempt).
    pub async fn resolve(
        &self,
        generation_id: &str,
        estimated_wait: Duration,
        max_retries: u32,
    ) -> Result<ResolvedAudio, ResolveError> {
        if let Some(cache) = &self.cache {
            if let Some(resolved) = cache.get(generation_id).await {
                tracing::debug!(generation_id, "audio cache hit");
                return Ok(resolved);
            }
        }

        if !estimated_wait.is_zero() {
            tracing::debug!(
                generation_id,
                wait_ms = estimated_wait.as_millis() as u64,
                "waiting for backend processing before first fetch"
            );
            tokio::time::sleep(estimated_wait).await;
        }

        let max_attempts = max_retries.max(1);
        let mut last_error = String::new();
        for attempt in 1..=max_attempts {
            match self.audio_repo.fetch_by_id(generation_id).await {
                Ok(bytes) => {
                    let resolved = ResolvedAudio {
                        url: format!("audio://{generation_id}"),
                        bytes: Arc::new(bytes),
                    };
                    tracing::info!(
                        generation_id,
                        attempt,
                        audio_size = resolved.bytes.len(),
                        "audio resolved"
                    );
                    if let Some(cache) = &self.cache {
                        cache.insert(generation_id.to_owned(), resolved.clone()).await;
                    }
                    return Ok(resolved);
                }
                Err(err) => {
                    tracing::warn!(
                        generation_id,
                        attempt,
                        error = %err,
                        "audio fetch attempt failed"
                    );
                    last_error = err;
                    if attempt < max_attempts {
                        // The backend does not distinguish transient from
                        // terminal failures, so every failure is retried
                        // uniformly up to the bound.
                        tokio::time::sleep(self.retry_interval).await;
                    }
                }
            }
        }

        Err(ResolveError::Exhausted {
            attempts: max_attempts,
            last_error,
        })
    }
}
