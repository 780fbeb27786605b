pub mod memory;

pub use memory::InMemoryDocumentStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppResult;

/// Opaque key-value document persistence collaborator.
/// Abstracts the underlying document database; the core needs exactly these
/// four operations and no query language beyond field equality.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a record by id. `Ok(None)` when absent.
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Value>>;

    /// Write a record. With an id this is a deep-merge upsert: fields absent
    /// from `record` are left untouched. Without an id the store creates the
    /// record under a freshly assigned id. Returns the record's id.
    async fn put(&self, collection: &str, id: Option<&str>, record: Value) -> AppResult<String>;

    /// Remove a record. Removing an absent record is not an error.
    async fn delete(&self, collection: &str, id: &str) -> AppResult<()>;

    /// Records whose top-level fields equal every `(field, value)` filter.
    async fn query(
        &self,
        collection: &str,
        filters: &[(&str, Value)],
    ) -> AppResult<Vec<(String, Value)>>;
}
