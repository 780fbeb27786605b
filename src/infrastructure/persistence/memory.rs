use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::DocumentStore;
use crate::error::AppResult;

/// Document store backed by process memory. Carries the full trait contract
/// (merge-upsert, id assignment, equality queries) so services can be
/// exercised in tests and demos without a real backend.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn deep_merge(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, incoming) => *slot = incoming,
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn put(&self, collection: &str, id: Option<&str>, record: Value) -> AppResult<String> {
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.to_owned()).or_default();
        match id {
            Some(id) => {
                match records.get_mut(id) {
                    Some(existing) => deep_merge(existing, record),
                    None => {
                        records.insert(id.to_owned(), record);
                    }
                }
                Ok(id.to_owned())
            }
            None => {
                let id = Uuid::new_v4().to_string();
                records.insert(id.clone(), record);
                Ok(id)
            }
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> AppResult<()> {
        let mut collections = self.collections.write().await;
        if let Some(records) = collections.get_mut(collection) {
            records.remove(id);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[(&str, Value)],
    ) -> AppResult<Vec<(String, Value)>> {
        let collections = self.collections.read().await;
        let Some(records) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(records
            .iter()
            .filter(|(_, record)| {
                filters
                    .iter()
                    .all(|(field, expected)| record.get(*field) == Some(expected))
            })
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_without_id_assigns_unique_ids() {
        let store = InMemoryDocumentStore::new();
        let first = store.put("c", None, json!({ "n": 1 })).await.unwrap();
        let second = store.put("c", None, json!({ "n": 2 })).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(store.get("c", &first).await.unwrap(), Some(json!({ "n": 1 })));
    }

    #[tokio::test]
    async fn test_put_with_id_deep_merges() {
        let store = InMemoryDocumentStore::new();
        store
            .put(
                "c",
                Some("doc"),
                json!({ "a": 1, "nested": { "keep": true, "swap": 1 } }),
            )
            .await
            .unwrap();
        store
            .put("c", Some("doc"), json!({ "nested": { "swap": 2 }, "b": 3 }))
            .await
            .unwrap();

        assert_eq!(
            store.get("c", "doc").await.unwrap(),
            Some(json!({ "a": 1, "b": 3, "nested": { "keep": true, "swap": 2 } }))
        );
    }

    #[tokio::test]
    async fn test_merge_replaces_arrays_wholesale() {
        let store = InMemoryDocumentStore::new();
        store
            .put("c", Some("doc"), json!({ "items": [1, 2, 3] }))
            .await
            .unwrap();
        store
            .put("c", Some("doc"), json!({ "items": [9] }))
            .await
            .unwrap();

        assert_eq!(
            store.get("c", "doc").await.unwrap(),
            Some(json!({ "items": [9] }))
        );
    }

    #[tokio::test]
    async fn test_query_matches_all_filters() {
        let store = InMemoryDocumentStore::new();
        store
            .put("c", Some("a"), json!({ "owner": "u1", "name": "x" }))
            .await
            .unwrap();
        store
            .put("c", Some("b"), json!({ "owner": "u1", "name": "y" }))
            .await
            .unwrap();
        store
            .put("c", Some("d"), json!({ "owner": "u2", "name": "x" }))
            .await
            .unwrap();

        let hits = store
            .query("c", &[("owner", json!("u1")), ("name", json!("x"))])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "a");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryDocumentStore::new();
        store.put("c", Some("doc"), json!({})).await.unwrap();
        store.delete("c", "doc").await.unwrap();
        store.delete("c", "doc").await.unwrap();
        assert_eq!(store.get("c", "doc").await.unwrap(), None);
    }
}
