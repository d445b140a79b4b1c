// ============================================================================
// docmapper Library
// ============================================================================

pub mod adapter;
pub mod connection;
pub mod core;
pub mod mapper;
pub mod query;
pub mod registry;
pub mod schema;
pub mod storage;

// Re-export main types for convenience
pub use core::{Document, FieldMap, OdmError, Result, ValueType};
pub use registry::Registry;

// Entity declaration and views
pub use docmapper_derive::Entity;
pub use schema::{Entity, EntityMetadata, EntityMethod, EntitySchema, FieldSpec, Signature};
pub use adapter::{Adapter, CompiledView, View, ViewMethod, ViewRef};

// Mapping and querying
pub use mapper::{Mapper, ReadOptions, Uploads, WriteOptions};
pub use query::{Direction, Selection};

// Re-export connection API
pub use connection::{
    Connector, ContextId, StoreContext, StoreInstance,
    config::{OdmConfig, StoreConfig},
    manager::StoreManager,
};
pub use storage::{
    BlobAccess, BlobInfo, BlobStore, DocumentSnapshot, DocumentStore, MemoryBlobStore,
    MemoryConnector, MemoryDocumentStore, StoreError,
};
