//! Entity declarations and the metadata extracted from them.

pub mod cache;
pub mod entity;
pub mod metadata;

pub use cache::MetadataCache;
pub use entity::{
    Entity, EntityMethod, EntitySchema, FieldAccessor, FieldMarkers, FieldSpec, GetterFn, MethodBody, SetterFn, Signature,
};
pub use metadata::{EntityMetadata, FieldDescriptor};
