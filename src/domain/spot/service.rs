use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio::task::JoinSet;

use super::error::SpotServiceError;
use super::model::{
    LoadedSpot, SpotMetadata, SpotSummary, FEATURE_STATES_KEY, OWNER_KEY, SHARED_SPOT_ID_KEY,
    SHARED_SPOT_NAME_KEY, SHARED_STATES_KEY,
};
use super::{CreateSpotRequest, UpdateSpotRequest};
use crate::domain::content::ContentPayload;
use crate::domain::resolver::AudioResolver;
use crate::domain::section::Section;
use crate::domain::serialization::{deserialize_feature_states, serialize_feature_states};
use crate::domain::spot::model::DownloadLog;
use crate::infrastructure::repositories::SpotRepository;

pub struct SpotService {
    spot_repo: Arc<SpotRepository>,
    resolver: Arc<AudioResolver>,
}

impl SpotService {
    pub fn new(spot_repo: Arc<SpotRepository>, resolver: Arc<AudioResolver>) -> Self {
        Self {
            spot_repo,
            resolver,
        }
    }
}

#[async_trait]
pub trait SpotServiceApi: Send + Sync {
    /// Create a new spot for the owner.
    ///
    /// The display name must be unique per owner (checked before anything is
    /// written). The metadata record is written first to obtain the assigned
    /// id, which is then embedded into `sharedStates.spotId` of the state
    /// record written under the same id.
    async fn create_spot(
        &self,
        owner_user_id: &str,
        request: CreateSpotRequest,
    ) -> Result<String, SpotServiceError>;

    /// Merge-write the state record of an existing spot and touch the
    /// metadata's `lastEditedAt`.
    async fn update_spot(
        &self,
        owner_user_id: &str,
        spot_id: &str,
        request: UpdateSpotRequest,
    ) -> Result<(), SpotServiceError>;

    /// Read both records, decode the section graph, and re-resolve every
    /// generated section's playable URL. Resolution failures never fail the
    /// load; the affected sections simply stay unplayable.
    async fn load_spot(&self, spot_id: &str) -> Result<LoadedSpot, SpotServiceError>;

    /// Copy a spot under a derived name with fresh timestamps, an empty
    /// download history, and a newly assigned id referenced consistently in
    /// both new records. Returns the new id.
    async fn duplicate_spot(&self, spot_id: &str) -> Result<String, SpotServiceError>;

    /// Rename a spot, keeping the metadata record and the name embedded in
    /// the state record in step. Renaming to the current name is a no-op.
    async fn rename_spot(
        &self,
        owner_user_id: &str,
        spot_id: &str,
        new_name: &str,
    ) -> Result<(), SpotServiceError>;

    /// Remove the legacy, metadata, and state records. Every delete is
    /// attempted; a partial failure is surfaced after the sweep and nothing
    /// is rolled back.
    async fn delete_spot(&self, spot_id: &str) -> Result<(), SpotServiceError>;

    /// The owner's spots, newest first.
    async fn list_spots(&self, owner_user_id: &str) -> Result<Vec<SpotSummary>, SpotServiceError>;

    /// Append a download log entry and stamp `lastDownloadedAt`.
    async fn log_download(
        &self,
        spot_id: &str,
        file_name: &str,
    ) -> Result<(), SpotServiceError>;
}

#[async_trait]
impl SpotServiceApi for SpotService {
    async fn create_spot(
        &self,
        owner_user_id: &str,
        request: CreateSpotRequest,
    ) -> Result<String, SpotServiceError> {
        let display_name = request.display_name.trim();
        if display_name.is_empty() {
            return Err(SpotServiceError::Invalid(
                "spot name must not be empty".to_string(),
            ));
        }

        if self
            .spot_repo
            .name_exists_for_owner(owner_user_id, display_name, None)
            .await?
        {
            return Err(SpotServiceError::NameConflict);
        }

        let now = Utc::now();
        let metadata = SpotMetadata {
            owner_user_id: owner_user_id.to_owned(),
            display_name: display_name.to_owned(),
            mode: request.mode,
            created_at: now,
            last_edited_at: now,
            last_downloaded_at: None,
            download_logs: Vec::new(),
        };
        let spot_id = self.spot_repo.create_metadata(&metadata).await?;
        tracing::info!(spot_id = %spot_id, owner_user_id, "spot metadata created");

        let mut shared_states = request.shared_states;
        shared_states.insert(
            SHARED_SPOT_ID_KEY.to_owned(),
            Value::String(spot_id.clone()),
        );
        let state_record = build_state_record(
            owner_user_id,
            &request.sections,
            &request.feature_states,
            shared_states,
        );

        // The metadata write has already happened; a failure here leaves the
        // pair inconsistent. Surfaced, not rolled back and not retried.
        if let Err(err) = self.spot_repo.put_state(&spot_id, state_record).await {
            tracing::error!(
                spot_id = %spot_id,
                error = %err,
                "state write failed after metadata write, spot left inconsistent"
            );
            return Err(SpotServiceError::PartialWrite(format!(
                "metadata {spot_id} written but state write failed: {err}"
            )));
        }

        tracing::info!(spot_id = %spot_id, "spot created");
        Ok(spot_id)
    }

    async fn update_spot(
        &self,
        owner_user_id: &str,
        spot_id: &str,
        request: UpdateSpotRequest,
    ) -> Result<(), SpotServiceError> {
        if spot_id.trim().is_empty() {
            return Err(SpotServiceError::MissingId);
        }
        // A deleted id must never be resurrected by an update.
        let metadata = self.find_metadata(spot_id).await?;
        if metadata.owner_user_id != owner_user_id {
            return Err(SpotServiceError::NotFound);
        }

        let state_record = build_state_record(
            owner_user_id,
            &request.sections,
            &request.feature_states,
            request.shared_states,
        );
        self.spot_repo.put_state(spot_id, state_record).await?;
        self.spot_repo.touch_last_edited(spot_id, Utc::now()).await?;

        tracing::info!(spot_id, "spot updated");
        Ok(())
    }

    async fn load_spot(&self, spot_id: &str) -> Result<LoadedSpot, SpotServiceError> {
        let metadata = self.find_metadata(spot_id).await?;
        let state = self
            .spot_repo
            .find_state(spot_id)
            .await?
            .ok_or(SpotServiceError::NotFound)?;

        let missing = Value::Null;
        let feature_value = state.get(FEATURE_STATES_KEY).unwrap_or(&missing);
        let (mut sections, feature_states) = deserialize_feature_states(feature_value)?;
        let shared_states = state
            .get(SHARED_STATES_KEY)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        self.hydrate_sections(&mut sections).await;

        tracing::info!(spot_id, sections = sections.len(), "spot loaded");
        Ok(LoadedSpot {
            spot_id: spot_id.to_owned(),
            metadata,
            sections,
            feature_states,
            shared_states,
        })
    }

    async fn duplicate_spot(&self, spot_id: &str) -> Result<String, SpotServiceError> {
        let metadata = self.find_metadata(spot_id).await?;
        let state = self
            .spot_repo
            .find_state(spot_id)
            .await?
            .ok_or(SpotServiceError::NotFound)?;

        let now = Utc::now();
        let copy_name = format!("{}--copy", metadata.display_name);
        let copy_metadata = SpotMetadata {
            owner_user_id: metadata.owner_user_id.clone(),
            display_name: copy_name.clone(),
            mode: metadata.mode,
            created_at: now,
            last_edited_at: now,
            last_downloaded_at: None,
            download_logs: Vec::new(),
        };
        let new_id = self.spot_repo.create_metadata(&copy_metadata).await?;

        let mut copy_state = state;
        if let Some(record) = copy_state.as_object_mut() {
            let shared = record
                .entry(SHARED_STATES_KEY.to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(shared) = shared.as_object_mut() {
                shared.insert(SHARED_SPOT_ID_KEY.to_owned(), Value::String(new_id.clone()));
                shared.insert(
                    SHARED_SPOT_NAME_KEY.to_owned(),
                    Value::String(copy_name.clone()),
                );
            }
        }

        if let Err(err) = self.spot_repo.put_state(&new_id, copy_state).await {
            tracing::error!(
                spot_id = %new_id,
                error = %err,
                "state write failed after metadata write, duplicate left inconsistent"
            );
            return Err(SpotServiceError::PartialWrite(format!(
                "metadata {new_id} written but state write failed: {err}"
            )));
        }

        tracing::info!(source = spot_id, spot_id = %new_id, name = %copy_name, "spot duplicated");
        Ok(new_id)
    }

    async fn rename_spot(
        &self,
        owner_user_id: &str,
        spot_id: &str,
        new_name: &str,
    ) -> Result<(), SpotServiceError> {
        if spot_id.trim().is_empty() {
            return Err(SpotServiceError::MissingId);
        }
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(SpotServiceError::Invalid(
                "spot name must not be empty".to_string(),
            ));
        }

        let metadata = self.find_metadata(spot_id).await?;
        if metadata.owner_user_id != owner_user_id {
            return Err(SpotServiceError::NotFound);
        }
        if metadata.display_name == new_name {
            return Ok(());
        }

        if self
            .spot_repo
            .name_exists_for_owner(owner_user_id, new_name, Some(spot_id))
            .await?
        {
            return Err(SpotServiceError::NameConflict);
        }

        self.spot_repo.update_display_name(spot_id, new_name).await?;
        // keep the name embedded in the state record in step; merge write
        // leaves everything else untouched
        self.spot_repo
            .put_state(
                spot_id,
                json!({ (SHARED_STATES_KEY): { (SHARED_SPOT_NAME_KEY): new_name } }),
            )
            .await?;

        tracing::info!(spot_id, new_name, "spot renamed");
        Ok(())
    }

    async fn delete_spot(&self, spot_id: &str) -> Result<(), SpotServiceError> {
        let deletions = [
            ("legacy record", self.spot_repo.delete_legacy(spot_id).await),
            ("metadata record", self.spot_repo.delete_metadata(spot_id).await),
            ("state record", self.spot_repo.delete_state(spot_id).await),
        ];

        let mut failures = Vec::new();
        for (label, result) in deletions {
            if let Err(err) = result {
                tracing::error!(spot_id, label, error = %err, "spot record delete failed");
                failures.push(format!("{label}: {err}"));
            }
        }

        if failures.is_empty() {
            tracing::info!(spot_id, "spot deleted");
            Ok(())
        } else {
            Err(SpotServiceError::PartialWrite(failures.join("; ")))
        }
    }

    async fn list_spots(&self, owner_user_id: &str) -> Result<Vec<SpotSummary>, SpotServiceError> {
        let mut rows = self.spot_repo.list_metadata_for_owner(owner_user_id).await?;
        rows.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at));
        Ok(rows
            .into_iter()
            .map(|(spot_id, metadata)| SpotSummary::from_metadata(spot_id, metadata))
            .collect())
    }

    async fn log_download(
        &self,
        spot_id: &str,
        file_name: &str,
    ) -> Result<(), SpotServiceError> {
        let mut metadata = self.find_metadata(spot_id).await?;
        let now = Utc::now();
        metadata.download_logs.push(DownloadLog {
            download_file_name: file_name.to_owned(),
            download_time: now,
        });
        metadata.last_downloaded_at = Some(now);
        self.spot_repo.update_metadata(spot_id, &metadata).await?;
        Ok(())
    }
}

impl SpotService {
    async fn find_metadata(&self, spot_id: &str) -> Result<SpotMetadata, SpotServiceError> {
        self.spot_repo
            .find_metadata(spot_id)
            .await?
            .ok_or(SpotServiceError::NotFound)
    }

    /// Re-resolves playable URLs for every generated section, each as an
    /// independent task so one section's backoff never blocks another. A
    /// result is applied only if the section at that position still carries
    /// the generation id it was fetched for; anything else is discarded.
    async fn hydrate_sections(&self, sections: &mut [Section]) {
        let mut tasks = JoinSet::new();
        for (index, section) in sections.iter().enumerate() {
            let ContentPayload::Generated(content) = &section.content else {
                continue;
            };
            let Some(generation_id) = content.generation_id.clone() else {
                continue;
            };
            let resolver = self.resolver.clone();
            tasks.spawn(async move {
                let outcome = resolver
                    .resolve(
                        &generation_id,
                        Duration::ZERO,
                        AudioResolver::DEFAULT_MAX_RETRIES,
                    )
                    .await;
                (index, generation_id, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let Ok((index, generation_id, outcome)) = joined else {
                continue;
            };
            let resolved = match outcome {
                Ok(resolved) => resolved,
                Err(err) => {
                    tracing::warn!(
                        section = index,
                        generation_id = %generation_id,
                        error = %err,
                        "section audio not resolvable yet"
                    );
                    continue;
                }
            };
            let Some(section) = sections.get_mut(index) else {
                continue;
            };
            if let ContentPayload::Generated(content) = &mut section.content {
                if content.generation_id.as_deref() == Some(generation_id.as_str()) {
                    content.resolved_audio_url = Some(resolved.url);
                }
            }
        }
    }
}

fn build_state_record(
    owner_user_id: &str,
    sections: &[Section],
    feature_states: &Map<String, Value>,
    shared_states: Map<String, Value>,
) -> Value {
    json!({
        (OWNER_KEY): owner_user_id,
        (FEATURE_STATES_KEY): serialize_feature_states(sections, feature_states),
        (SHARED_STATES_KEY): Value::Object(shared_states),
    })
}
