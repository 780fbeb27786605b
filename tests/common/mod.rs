#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use adspot_backend::domain::content::{ContentKind, ContentPayload, GeneratedContent, UploadedContent};
use adspot_backend::domain::resolver::AudioResolver;
use adspot_backend::domain::section::Section;
use adspot_backend::domain::spot::{CreateSpotRequest, SpotMode, SpotService};
use adspot_backend::error::{AppError, AppResult};
use adspot_backend::infrastructure::persistence::{DocumentStore, InMemoryDocumentStore};
use adspot_backend::infrastructure::repositories::{AudioRepository, SpotRepository};

/// In-memory store that counts calls and can be told to fail writes or
/// deletes for chosen collections.
#[derive(Default)]
pub struct RecordingStore {
    inner: InMemoryDocumentStore,
    put_calls: AtomicU32,
    delete_calls: AtomicU32,
    fail_put_collections: std::sync::Mutex<HashSet<String>>,
    fail_delete_collections: std::sync::Mutex<HashSet<String>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put_calls(&self) -> u32 {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn fail_puts_for(&self, collection: &str) {
        self.fail_put_collections
            .lock()
            .unwrap()
            .insert(collection.to_owned());
    }

    pub fn fail_deletes_for(&self, collection: &str) {
        self.fail_delete_collections
            .lock()
            .unwrap()
            .insert(collection.to_owned());
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Value>> {
        self.inner.get(collection, id).await
    }

    async fn put(&self, collection: &str, id: Option<&str>, record: Value) -> AppResult<String> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_put_collections
            .lock()
            .unwrap()
            .contains(collection)
        {
            return Err(AppError::Store(format!(
                "simulated write failure in {collection}"
            )));
        }
        self.inner.put(collection, id, record).await
    }

    async fn delete(&self, collection: &str, id: &str) -> AppResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_delete_collections
            .lock()
            .unwrap()
            .contains(collection)
        {
            return Err(AppError::Store(format!(
                "simulated delete failure in {collection}"
            )));
        }
        self.inner.delete(collection, id).await
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[(&str, Value)],
    ) -> AppResult<Vec<(String, Value)>> {
        self.inner.query(collection, filters).await
    }
}

/// Audio backend serving a fixed id → bytes table; unknown ids fail every
/// attempt.
#[derive(Default)]
pub struct StaticAudioBackend {
    renders: HashMap<String, Vec<u8>>,
    calls: AtomicU32,
}

impl StaticAudioBackend {
    pub fn new(renders: &[(&str, &[u8])]) -> Arc<Self> {
        Arc::new(Self {
            renders: renders
                .iter()
                .map(|(id, bytes)| ((*id).to_owned(), bytes.to_vec()))
                .collect(),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioRepository for StaticAudioBackend {
    async fn fetch_by_id(&self, generation_id: &str) -> Result<Vec<u8>, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.renders
            .get(generation_id)
            .cloned()
            .ok_or_else(|| format!("no render for {generation_id}"))
    }
}

/// Audio backend that fails the first `failures_per_id` fetches of every id,
/// then serves bytes.
pub struct FlakyAudioBackend {
    failures_per_id: u32,
    attempts: Mutex<HashMap<String, u32>>,
}

impl FlakyAudioBackend {
    pub fn new(failures_per_id: u32) -> Arc<Self> {
        Arc::new(Self {
            failures_per_id,
            attempts: Mutex::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl AudioRepository for FlakyAudioBackend {
    async fn fetch_by_id(&self, generation_id: &str) -> Result<Vec<u8>, String> {
        let mut attempts = self.attempts.lock().await;
        let seen = attempts.entry(generation_id.to_owned()).or_insert(0);
        *seen += 1;
        if *seen <= self.failures_per_id {
            Err(format!("{generation_id} still processing"))
        } else {
            Ok(generation_id.as_bytes().to_vec())
        }
    }
}

pub fn spot_service(store: Arc<RecordingStore>, audio: Arc<dyn AudioRepository>) -> SpotService {
    let resolver = AudioResolver::new(audio, false).with_retry_interval(Duration::from_secs(15));
    SpotService::new(Arc::new(SpotRepository::new(store)), Arc::new(resolver))
}

pub fn generated_section(position: usize, script: &str, generation_id: Option<&str>) -> Section {
    let mut content = GeneratedContent::from_script(script);
    content.generation_id = generation_id.map(str::to_owned);
    let mut section = Section::new(position, ContentKind::Generated);
    section.content = ContentPayload::Generated(content);
    section.update_duration();
    section
}

pub fn uploaded_section(position: usize, name: &str, bytes: Vec<u8>) -> Section {
    let mut section = Section::new(position, ContentKind::Uploaded);
    section.content = ContentPayload::Uploaded(UploadedContent::with_asset(name, bytes));
    section
}

pub fn create_request(display_name: &str, sections: Vec<Section>) -> CreateSpotRequest {
    CreateSpotRequest {
        display_name: display_name.to_owned(),
        mode: SpotMode::SingleSpot,
        sections,
        feature_states: Map::new(),
        shared_states: Map::new(),
    }
}
