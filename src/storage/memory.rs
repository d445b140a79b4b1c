//! In-memory document and blob stores.
//!
//! Used as the reference backend and by the test suite. Both stores support
//! fault injection (`fail_next`, and `fail_path` for blobs) and count every
//! call they receive.

use super::evaluate;
use super::{
    BatchOp, BlobAccess, BlobInfo, BlobStore, DocumentSnapshot, DocumentStore, StoreError,
    StoreResult, WriteBatch,
};
use crate::connection::{Connector, StoreConfig, StoreContext};
use crate::core::{Document, Result};
use crate::query::QuerySpec;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Queue of failures handed out to the next calls, one per call.
#[derive(Debug, Default)]
struct FaultPlan {
    pending: Mutex<VecDeque<StoreError>>,
    calls: AtomicUsize,
}

impl FaultPlan {
    fn push(&self, error: StoreError) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push_back(error);
        }
    }

    fn check(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut pending = self
            .pending
            .lock()
            .map_err(|err| StoreError::Execution(err.to_string()))?;
        match pending.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Failures bound to one blob path, returned by every write or delete of it.
#[derive(Debug, Default)]
struct PathFaults {
    failing: Mutex<HashMap<String, StoreError>>,
}

impl PathFaults {
    fn insert(&self, path: &str, error: StoreError) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(path.to_string(), error);
        }
    }

    fn check(&self, path: &str) -> StoreResult<()> {
        let failing = self
            .failing
            .lock()
            .map_err(|err| StoreError::Execution(err.to_string()))?;
        match failing.get(path) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

pub struct MemoryDocumentStore {
    /// Collections by path, each holding documents ordered by id
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
    faults: FaultPlan,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            faults: FaultPlan::default(),
        }
    }

    /// Makes the next store call fail with `error`.
    pub fn fail_next(&self, error: StoreError) {
        self.faults.push(error);
    }

    /// Number of calls received so far (id generation excluded).
    pub fn call_count(&self) -> usize {
        self.faults.calls()
    }

    /// Number of documents currently stored in `collection`.
    pub async fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|documents| documents.len())
            .unwrap_or(0)
    }

    /// Raw stored document, bypassing fault injection.
    pub async fn raw(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .read()
            .await
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned()
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn generate_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<DocumentSnapshot>> {
        self.faults.check()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|data| DocumentSnapshot {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn set(&self, collection: &str, id: &str, data: Document) -> StoreResult<()> {
        self.faults.check()?;
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    async fn merge(&self, collection: &str, id: &str, fields: Document) -> StoreResult<()> {
        self.faults.check()?;
        let mut collections = self.collections.write().await;
        let document = collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| {
                StoreError::Execution(format!("No document to update: {}/{}", collection, id))
            })?;
        for (name, value) in fields {
            document.insert(name, value);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.faults.check()?;
        let mut collections = self.collections.write().await;
        if let Some(documents) = collections.get_mut(collection) {
            documents.remove(id);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, spec: &QuerySpec) -> StoreResult<Vec<DocumentSnapshot>> {
        self.faults.check()?;
        let records: Vec<DocumentSnapshot> = {
            let collections = self.collections.read().await;
            collections
                .get(collection)
                .map(|documents| {
                    documents
                        .iter()
                        .map(|(id, data)| DocumentSnapshot {
                            id: id.clone(),
                            data: data.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default()
        };
        Ok(evaluate::apply(spec, records))
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.faults.check()?;
        let mut collections = self.collections.write().await;
        for op in batch.ops() {
            match op {
                BatchOp::Set { collection, id, data } => {
                    collections
                        .entry(collection.clone())
                        .or_default()
                        .insert(id.clone(), data.clone());
                }
                BatchOp::Delete { collection, id } => {
                    if let Some(documents) = collections.get_mut(collection) {
                        documents.remove(id);
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    public_read: bool,
    generation: u64,
    updated: DateTime<Utc>,
}

pub struct MemoryBlobStore {
    bucket: String,
    blobs: RwLock<HashMap<String, StoredBlob>>,
    generation: AtomicU64,
    faults: FaultPlan,
    path_faults: PathFaults,
}

fn encode_object_name(path: &str) -> String {
    path.replace('%', "%25").replace('/', "%2F").replace(' ', "%20")
}

impl MemoryBlobStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            blobs: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(1),
            faults: FaultPlan::default(),
            path_faults: PathFaults::default(),
        }
    }

    pub fn fail_next(&self, error: StoreError) {
        self.faults.push(error);
    }

    /// Makes every create, overwrite and delete of `path` fail with `error`.
    pub fn fail_path(&self, path: &str, error: StoreError) {
        self.path_faults.insert(path, error);
    }

    pub fn call_count(&self) -> usize {
        self.faults.calls()
    }

    /// Stored content, bypassing fault injection.
    pub async fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(path).map(|blob| blob.data.clone())
    }

    pub async fn blob_count(&self) -> usize {
        self.blobs.read().await.len()
    }

    fn info(&self, path: &str, blob: &StoredBlob) -> BlobInfo {
        BlobInfo {
            path: path.to_string(),
            size: blob.data.len(),
            media_link: format!(
                "memory://{}/o/{}?generation={}&alt=media",
                self.bucket,
                encode_object_name(path),
                blob.generation
            ),
            generation: blob.generation,
            public_read: blob.public_read,
            updated: blob.updated,
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, path: &str) -> StoreResult<Option<BlobInfo>> {
        self.faults.check()?;
        let blobs = self.blobs.read().await;
        Ok(blobs.get(path).map(|blob| self.info(path, blob)))
    }

    async fn get_many(&self, paths: &[String]) -> StoreResult<Vec<Option<BlobInfo>>> {
        self.faults.check()?;
        let blobs = self.blobs.read().await;
        Ok(paths
            .iter()
            .map(|path| blobs.get(path).map(|blob| self.info(path, blob)))
            .collect())
    }

    async fn create(&self, path: &str, data: Vec<u8>, access: BlobAccess) -> StoreResult<BlobInfo> {
        self.faults.check()?;
        self.path_faults.check(path)?;
        let mut blobs = self.blobs.write().await;
        if blobs.contains_key(path) {
            return Err(StoreError::Execution(format!("Blob {} already exists", path)));
        }
        let blob = StoredBlob {
            data,
            public_read: access == BlobAccess::PublicRead,
            generation: self.next_generation(),
            updated: Utc::now(),
        };
        let info = self.info(path, &blob);
        blobs.insert(path.to_string(), blob);
        Ok(info)
    }

    async fn overwrite(&self, path: &str, data: Vec<u8>) -> StoreResult<BlobInfo> {
        self.faults.check()?;
        self.path_faults.check(path)?;
        let mut blobs = self.blobs.write().await;
        let generation = self.next_generation();
        let blob = blobs
            .get_mut(path)
            .ok_or_else(|| StoreError::Execution(format!("Blob {} does not exist", path)))?;
        blob.data = data;
        blob.generation = generation;
        blob.updated = Utc::now();
        Ok(self.info(path, blob))
    }

    async fn delete(&self, path: &str) -> StoreResult<bool> {
        self.faults.check()?;
        self.path_faults.check(path)?;
        Ok(self.blobs.write().await.remove(path).is_some())
    }
}

/// Connector handing out in-memory stores.
///
/// Every instance connected through the same connector shares one document
/// store; blob stores are kept per bucket. Each connect yields a new context.
pub struct MemoryConnector {
    documents: Arc<MemoryDocumentStore>,
    buckets: Mutex<HashMap<String, Arc<MemoryBlobStore>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(MemoryDocumentStore::new()),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn documents(&self) -> Arc<MemoryDocumentStore> {
        Arc::clone(&self.documents)
    }

    /// Blob store for `bucket`, created on first use.
    pub fn blobs(&self, bucket: &str) -> Result<Arc<MemoryBlobStore>> {
        let mut buckets = self.buckets.lock()?;
        Ok(Arc::clone(
            buckets
                .entry(bucket.to_string())
                .or_insert_with(|| Arc::new(MemoryBlobStore::new(bucket))),
        ))
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, config: &StoreConfig) -> Result<StoreContext> {
        let blobs = self.blobs(&config.bucket)?;
        Ok(StoreContext::new(&config.bucket, self.documents(), blobs))
    }
}
