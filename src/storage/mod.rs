//! Backing store contracts.
//!
//! The mapper talks to two collaborators: a document store holding one record
//! per entity and a blob store holding the binary content behind file fields.
//! Both are asynchronous; the mapper awaits every call before continuing.

mod evaluate;
pub mod memory;

use crate::core::{Document, OdmError};
use crate::query::QuerySpec;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use memory::{MemoryBlobStore, MemoryConnector, MemoryDocumentStore};

/// Failure reported by a backing store call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The call ran and failed.
    #[error("{0}")]
    Execution(String),

    /// The wait for the call was interrupted or cancelled.
    #[error("{0}")]
    Interrupted(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for OdmError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Execution(message) => OdmError::Execution(message),
            StoreError::Interrupted(message) => OdmError::Interrupted(message),
        }
    }
}

/// A record returned by a lookup or a query.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub data: Document,
}

/// One operation of an atomic multi-document commit.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    Set {
        collection: String,
        id: String,
        data: Document,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// Operations applied all-or-nothing by [`DocumentStore::commit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: &str, id: &str, data: Document) -> &mut Self {
        self.ops.push(BatchOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        });
        self
    }

    pub fn delete(&mut self, collection: &str, id: &str) -> &mut Self {
        self.ops.push(BatchOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        self
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns a fresh store-generated document id.
    fn generate_id(&self) -> String;

    /// Point lookup; `None` when absent.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<DocumentSnapshot>>;

    /// Full replace (upsert).
    async fn set(&self, collection: &str, id: &str, data: Document) -> StoreResult<()>;

    /// Partial merge of top-level fields into an existing document.
    async fn merge(&self, collection: &str, id: &str, fields: Document) -> StoreResult<()>;

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Filtered, ordered, paginated multi-get.
    async fn query(&self, collection: &str, spec: &QuerySpec) -> StoreResult<Vec<DocumentSnapshot>>;

    /// Applies every operation of the batch atomically.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}

/// Visibility granted to a newly created blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobAccess {
    Private,
    PublicRead,
}

/// Metadata of a stored blob.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobInfo {
    pub path: String,
    pub size: usize,
    /// Public locator url of the current content.
    pub media_link: String,
    pub generation: u64,
    pub public_read: bool,
    pub updated: DateTime<Utc>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Metadata lookup; `None` when absent.
    async fn get(&self, path: &str) -> StoreResult<Option<BlobInfo>>;

    /// Batch lookup; missing entries resolve to `None`, in input order.
    async fn get_many(&self, paths: &[String]) -> StoreResult<Vec<Option<BlobInfo>>>;

    /// Creates a new blob with the given access grant.
    async fn create(&self, path: &str, data: Vec<u8>, access: BlobAccess) -> StoreResult<BlobInfo>;

    /// Replaces the content of an existing blob in place.
    async fn overwrite(&self, path: &str, data: Vec<u8>) -> StoreResult<BlobInfo>;

    /// Deletes a blob; `false` when it did not exist.
    async fn delete(&self, path: &str) -> StoreResult<bool>;
}
