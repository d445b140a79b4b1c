//! Store instances and the handles they resolve.
//!
//! A [`StoreInstance`] is bootstrapped through a [`Connector`]; once connected
//! it yields a [`StoreContext`], which resolves a collection path into the
//! document collection handle and the blob container handle the mapper uses.

pub mod config;
pub mod manager;

use crate::core::{Document, OdmError, Result};
use crate::query::QuerySpec;
use crate::storage::{
    BlobAccess, BlobInfo, BlobStore, DocumentSnapshot, DocumentStore, StoreResult, WriteBatch,
};
use log::info;
use std::fmt;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

pub use config::{OdmConfig, StoreConfig};
pub use manager::StoreManager;

/// Identity of one live connection; selections are bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connected store handles.
#[derive(Clone)]
pub struct StoreContext {
    id: ContextId,
    bucket: String,
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
}

impl StoreContext {
    pub fn new(bucket: &str, documents: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            id: ContextId::new(),
            bucket: bucket.to_string(),
            documents,
            blobs,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Resolves a collection path into its document and blob handles.
    pub fn resolve(&self, path: &str) -> (CollectionRef, BlobContainer) {
        let collection = CollectionRef {
            context: self.id,
            path: path.to_string(),
            documents: Arc::clone(&self.documents),
        };
        let container = BlobContainer {
            bucket: self.bucket.clone(),
            blobs: Arc::clone(&self.blobs),
        };
        (collection, container)
    }
}

impl fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreContext")
            .field("id", &self.id)
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// Document collection handle bound to one path.
#[derive(Clone)]
pub struct CollectionRef {
    context: ContextId,
    path: String,
    documents: Arc<dyn DocumentStore>,
}

impl CollectionRef {
    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn generate_id(&self) -> String {
        self.documents.generate_id()
    }

    pub async fn get(&self, id: &str) -> StoreResult<Option<DocumentSnapshot>> {
        self.documents.get(&self.path, id).await
    }

    pub async fn exists(&self, id: &str) -> StoreResult<bool> {
        Ok(self.get(id).await?.is_some())
    }

    pub async fn set(&self, id: &str, data: Document) -> StoreResult<()> {
        self.documents.set(&self.path, id, data).await
    }

    pub async fn merge(&self, id: &str, fields: Document) -> StoreResult<()> {
        self.documents.merge(&self.path, id, fields).await
    }

    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        self.documents.delete(&self.path, id).await
    }

    pub async fn query(&self, spec: &QuerySpec) -> StoreResult<Vec<DocumentSnapshot>> {
        self.documents.query(&self.path, spec).await
    }

    pub async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.documents.commit(batch).await
    }
}

impl fmt::Debug for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionRef")
            .field("context", &self.context)
            .field("path", &self.path)
            .finish()
    }
}

/// Blob bucket handle.
#[derive(Clone)]
pub struct BlobContainer {
    bucket: String,
    blobs: Arc<dyn BlobStore>,
}

impl BlobContainer {
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub async fn get(&self, path: &str) -> StoreResult<Option<BlobInfo>> {
        self.blobs.get(path).await
    }

    pub async fn get_many(&self, paths: &[String]) -> StoreResult<Vec<Option<BlobInfo>>> {
        self.blobs.get_many(paths).await
    }

    pub async fn create(&self, path: &str, data: Vec<u8>, access: BlobAccess) -> StoreResult<BlobInfo> {
        self.blobs.create(path, data, access).await
    }

    pub async fn overwrite(&self, path: &str, data: Vec<u8>) -> StoreResult<BlobInfo> {
        self.blobs.overwrite(path, data).await
    }

    pub async fn delete(&self, path: &str) -> StoreResult<bool> {
        self.blobs.delete(path).await
    }
}

/// Bootstrap seam: turns a configuration into connected store handles.
pub trait Connector: Send + Sync {
    fn connect(&self, config: &StoreConfig) -> Result<StoreContext>;
}

/// One configured store, connected or not.
pub struct StoreInstance {
    config: StoreConfig,
    connector: Arc<dyn Connector>,
    context: RwLock<Option<StoreContext>>,
}

impl StoreInstance {
    pub fn new(config: StoreConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            context: RwLock::new(None),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.config.name.as_deref()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn label(&self) -> &str {
        self.name().unwrap_or("default")
    }

    pub fn is_connected(&self) -> Result<bool> {
        Ok(self.context.read()?.is_some())
    }

    pub fn connect(&self) -> Result<()> {
        let mut context = self.context.write()?;
        if context.is_some() {
            return Err(OdmError::Connection(format!(
                "Store instance {} is already connected",
                self.label()
            )));
        }

        info!("Connecting store instance {}...", self.label());
        *context = Some(self.connector.connect(&self.config)?);
        info!("Store instance {} connected", self.label());
        Ok(())
    }

    pub fn disconnect(&self) -> Result<()> {
        let mut context = self.context.write()?;
        if context.is_none() {
            return Err(OdmError::Connection(format!(
                "Store instance {} is not connected",
                self.label()
            )));
        }

        info!("Disconnecting store instance {}...", self.label());
        *context = None;
        info!("Store instance {} disconnected", self.label());
        Ok(())
    }

    /// Current handles; fails when the instance is not connected.
    pub fn context(&self) -> Result<StoreContext> {
        self.context.read()?.clone().ok_or_else(|| {
            OdmError::Connection(format!("Store instance {} is not connected", self.label()))
        })
    }

    pub fn resolve(&self, path: &str) -> Result<(CollectionRef, BlobContainer)> {
        Ok(self.context()?.resolve(path))
    }
}

impl fmt::Debug for StoreInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreInstance")
            .field("config", &self.config)
            .finish()
    }
}
