use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::domain::spot::SpotMetadata;
use crate::error::{AppError, AppResult};
use crate::infrastructure::persistence::DocumentStore;

pub const SPOTS_META_COLLECTION: &str = "spots_meta_data";
pub const SPOTS_STATE_COLLECTION: &str = "ads";
/// Denormalized record kept by earlier clients; still swept on delete.
pub const SPOTS_LEGACY_COLLECTION: &str = "spots";

const OWNER_FIELD: &str = "ownerUserId";
const DISPLAY_NAME_FIELD: &str = "displayName";
const LAST_EDITED_FIELD: &str = "lastEditedAt";

/// Typed access to the metadata/state record pair of a spot.
pub struct SpotRepository {
    store: Arc<dyn DocumentStore>,
}

impl SpotRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Get a spot's metadata record by id
    pub async fn find_metadata(&self, spot_id: &str) -> AppResult<Option<SpotMetadata>> {
        let Some(record) = self.store.get(SPOTS_META_COLLECTION, spot_id).await? else {
            return Ok(None);
        };
        let metadata = serde_json::from_value(record)
            .map_err(|e| AppError::Internal(format!("corrupt metadata record {spot_id}: {e}")))?;
        Ok(Some(metadata))
    }

    /// Write a fresh metadata record and return the assigned id
    pub async fn create_metadata(&self, metadata: &SpotMetadata) -> AppResult<String> {
        let record = serde_json::to_value(metadata)
            .map_err(|e| AppError::Internal(format!("metadata encode failed: {e}")))?;
        self.store.put(SPOTS_META_COLLECTION, None, record).await
    }

    /// Overwrite an existing metadata record
    pub async fn update_metadata(&self, spot_id: &str, metadata: &SpotMetadata) -> AppResult<()> {
        let record = serde_json::to_value(metadata)
            .map_err(|e| AppError::Internal(format!("metadata encode failed: {e}")))?;
        self.store
            .put(SPOTS_META_COLLECTION, Some(spot_id), record)
            .await?;
        Ok(())
    }

    pub async fn touch_last_edited(&self, spot_id: &str, at: DateTime<Utc>) -> AppResult<()> {
        self.store
            .put(
                SPOTS_META_COLLECTION,
                Some(spot_id),
                json!({ (LAST_EDITED_FIELD): at }),
            )
            .await?;
        Ok(())
    }

    pub async fn update_display_name(&self, spot_id: &str, display_name: &str) -> AppResult<()> {
        self.store
            .put(
                SPOTS_META_COLLECTION,
                Some(spot_id),
                json!({ (DISPLAY_NAME_FIELD): display_name }),
            )
            .await?;
        Ok(())
    }

    /// Check whether the owner already has a spot with this display name,
    /// optionally ignoring one spot (for renames)
    pub async fn name_exists_for_owner(
        &self,
        owner_user_id: &str,
        display_name: &str,
        exclude_spot_id: Option<&str>,
    ) -> AppResult<bool> {
        let hits = self
            .store
            .query(
                SPOTS_META_COLLECTION,
                &[
                    (OWNER_FIELD, json!(owner_user_id)),
                    (DISPLAY_NAME_FIELD, json!(display_name)),
                ],
            )
            .await?;
        Ok(hits
            .iter()
            .any(|(id, _)| Some(id.as_str()) != exclude_spot_id))
    }

    /// All metadata records for an owner. Rows that no longer decode are
    /// skipped with a warning rather than failing the whole listing.
    pub async fn list_metadata_for_owner(
        &self,
        owner_user_id: &str,
    ) -> AppResult<Vec<(String, SpotMetadata)>> {
        let hits = self
            .store
            .query(SPOTS_META_COLLECTION, &[(OWNER_FIELD, json!(owner_user_id))])
            .await?;
        let mut rows = Vec::with_capacity(hits.len());
        for (spot_id, record) in hits {
            match serde_json::from_value::<SpotMetadata>(record) {
                Ok(metadata) => rows.push((spot_id, metadata)),
                Err(err) => {
                    tracing::warn!(spot_id = %spot_id, error = %err, "skipping undecodable metadata record");
                }
            }
        }
        Ok(rows)
    }

    /// Get a spot's full-state record by id
    pub async fn find_state(&self, spot_id: &str) -> AppResult<Option<Value>> {
        self.store.get(SPOTS_STATE_COLLECTION, spot_id).await
    }

    /// Merge-write the full-state record under a known id
    pub async fn put_state(&self, spot_id: &str, record: Value) -> AppResult<()> {
        self.store
            .put(SPOTS_STATE_COLLECTION, Some(spot_id), record)
            .await?;
        Ok(())
    }

    pub async fn delete_metadata(&self, spot_id: &str) -> AppResult<()> {
        self.store.delete(SPOTS_META_COLLECTION, spot_id).await
    }

    pub async fn delete_state(&self, spot_id: &str) -> AppResult<()> {
        self.store.delete(SPOTS_STATE_COLLECTION, spot_id).await
    }

    pub async fn delete_legacy(&self, spot_id: &str) -> AppResult<()> {
        self.store.delete(SPOTS_LEGACY_COLLECTION, spot_id).await
    }
}
