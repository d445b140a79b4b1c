//! Object-document mapper: CRUD and querying for one entity type over one
//! collection, keeping each document and the blobs behind its file fields
//! consistent.

mod create;
mod delete;
mod files;
pub mod options;
mod retrieve;
mod update;

use crate::adapter::{CompiledView, ViewRef};
use crate::connection::{BlobContainer, CollectionRef, StoreInstance};
use crate::core::naming::{blob_path, clean_key, convert_key};
use crate::core::{Document, OdmError, Result};
use crate::query::{FieldRef, FilterOp, QuerySpec, Selection};
use crate::registry::Registry;
use crate::schema::{Entity, EntityMetadata};
use log::warn;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

pub use options::{ReadOptions, Stream, Uploads, WriteOptions};

enum Binding {
    Unbound,
    Bound(Arc<StoreInstance>),
}

/// Store handles and metadata resolved for one operation.
pub(crate) struct Handles<T> {
    pub collection: CollectionRef,
    pub container: BlobContainer,
    pub metadata: Arc<EntityMetadata<T>>,
}

/// Maps entities of type `T` to documents of one collection.
///
/// A mapper starts unbound and attaches itself to the registry's default
/// store instance on first use, unless bound explicitly beforehand. Every
/// operation resolves fresh handles from the bound instance.
pub struct Mapper<T> {
    registry: Arc<Registry>,
    path: String,
    binding: RwLock<Binding>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Mapper<T> {
    pub fn new(registry: Arc<Registry>, path: &str) -> Result<Self> {
        let path = clean_key("Path", path, registry.config().key_byte_limit)?;
        Ok(Self {
            registry,
            path,
            binding: RwLock::new(Binding::Unbound),
            _entity: PhantomData,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn metadata(&self) -> Result<Arc<EntityMetadata<T>>> {
        self.registry.metadata::<T>()
    }

    pub fn is_bound(&self) -> Result<bool> {
        Ok(matches!(*self.binding.read()?, Binding::Bound(_)))
    }

    /// Attaches the mapper to `instance`, replacing any earlier binding.
    pub fn bind(&self, instance: Arc<StoreInstance>) -> Result<&Self> {
        *self.binding.write()? = Binding::Bound(instance);
        Ok(self)
    }

    /// Attaches the mapper to the registry instance called `name`.
    pub fn bind_named(&self, name: &str) -> Result<&Self> {
        let instance = self.registry.stores().get(Some(name))?;
        self.bind(instance)
    }

    fn instance(&self) -> Result<Arc<StoreInstance>> {
        if let Binding::Bound(instance) = &*self.binding.read()? {
            return Ok(Arc::clone(instance));
        }

        let mut binding = self.binding.write()?;
        match &*binding {
            Binding::Bound(instance) => Ok(Arc::clone(instance)),
            Binding::Unbound => {
                let instance = self.registry.stores().get(None)?;
                *binding = Binding::Bound(Arc::clone(&instance));
                Ok(instance)
            }
        }
    }

    pub(crate) fn handles(&self) -> Result<Handles<T>> {
        let metadata = self.metadata()?;
        let (collection, container) = self.instance()?.resolve(&self.path)?;
        Ok(Handles {
            collection,
            container,
            metadata,
        })
    }

    pub(crate) fn convert_key(&self, key: &str) -> Result<String> {
        convert_key(Some(key), self.registry.config().key_byte_limit)
    }

    pub(crate) fn entity_key(&self, metadata: &EntityMetadata<T>, entity: &T) -> Result<String> {
        convert_key(
            metadata.key().get(entity).as_deref(),
            self.registry.config().key_byte_limit,
        )
    }

    pub(crate) fn compiled(
        &self,
        view: Option<&ViewRef<T>>,
    ) -> Result<Option<Arc<CompiledView<T>>>> {
        view.map(|view| self.registry.view(view)).transpose()
    }

    pub(crate) fn encode(
        &self,
        metadata: &EntityMetadata<T>,
        entity: &T,
        view: Option<&CompiledView<T>>,
    ) -> Result<Document> {
        match view {
            Some(view) => view.encode(entity),
            None => metadata.to_document(entity),
        }
    }

    pub(crate) fn decode(
        &self,
        metadata: &EntityMetadata<T>,
        document: Document,
        view: Option<&CompiledView<T>>,
    ) -> Result<T> {
        match view {
            Some(view) => view.decode(document),
            None => metadata.from_document(document),
        }
    }

    pub(crate) fn blob_path(&self, key: &str, name: &str) -> String {
        blob_path(&self.path, key, name)
    }

    /// Validates streams against the current file field values of `entity`.
    pub(crate) fn check_uploads(
        &self,
        metadata: &EntityMetadata<T>,
        entity: &T,
        uploads: &Uploads,
    ) -> Result<()> {
        for name in uploads.names() {
            let field = metadata.require_file(name)?;
            if field.get(entity).is_some() {
                return Err(OdmError::Format(format!(
                    "File field {} must be null in entity",
                    name
                )));
            }
            uploads.check_present(name)?;
        }
        Ok(())
    }

    /// Creates or overwrites the blob of every stream; returns the media links.
    ///
    /// Paths of blobs this call created (rather than overwrote) are pushed to
    /// `created` as they are stored, so a caller can undo a partial upload.
    pub(crate) async fn store_uploads(
        &self,
        handles: &Handles<T>,
        key: &str,
        uploads: Uploads,
        created: &mut Vec<String>,
    ) -> Result<BTreeMap<String, String>> {
        let mut links = BTreeMap::new();
        for (name, bytes) in uploads.read_all().await? {
            let path = self.blob_path(key, &name);
            let info = match handles.container.get(&path).await? {
                None => {
                    let info = handles
                        .container
                        .create(&path, bytes, self.registry.config().blob_access)
                        .await?;
                    created.push(path);
                    info
                }
                Some(_) => handles.container.overwrite(&path, bytes).await?,
            };
            links.insert(name, info.media_link);
        }
        Ok(links)
    }

    /// Deletes whichever of `paths` exist; returns how many were deleted.
    ///
    /// Every path is attempted. A failed delete is logged and the first
    /// failure is returned once all paths were tried.
    pub(crate) async fn remove_blobs(&self, container: &BlobContainer, paths: Vec<String>) -> Result<usize> {
        if paths.is_empty() {
            return Ok(0);
        }
        let mut deleted = 0;
        let mut first_error = None;
        let found = container.get_many(&paths).await?;
        for (path, info) in paths.iter().zip(found) {
            if info.is_none() {
                continue;
            }
            match container.delete(path).await {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!("blob delete failed: path='{}' error='{}'", path, err);
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(deleted),
        }
    }

    /// Blob cleanup after a committed document delete; failures are logged.
    pub(crate) async fn remove_blobs_after_delete(&self, container: &BlobContainer, paths: Vec<String>) {
        let count = paths.len();
        if let Err(err) = self.remove_blobs(container, paths).await {
            warn!(
                "blob cleanup incomplete: collection='{}' paths={} error='{}'",
                self.path, count, err
            );
        }
    }

    /// Keys among `keys` that already have a document.
    pub(crate) async fn existing_keys(&self, collection: &CollectionRef, keys: &[String]) -> Result<Vec<String>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let spec = QuerySpec::new().with_filter(
            FieldRef::DocumentId,
            FilterOp::In,
            Value::Array(keys.iter().cloned().map(Value::String).collect()),
        );
        Ok(collection
            .query(&spec)
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect())
    }

    /// Fails with `Query` unless `selection` targets this mapper's collection
    /// on the currently bound store context.
    pub(crate) fn check_selection(&self, handles: &Handles<T>, selection: &Selection) -> Result<()> {
        if selection.context() != handles.collection.context() {
            return Err(OdmError::Query(format!(
                "Selection over {} was built against another store context",
                selection.collection()
            )));
        }
        if selection.collection() != self.path {
            return Err(OdmError::Query(format!(
                "Selection over {} cannot be used with collection {}",
                selection.collection(),
                self.path
            )));
        }
        Ok(())
    }

    /// Selection over the whole collection.
    pub fn select(&self) -> Result<Selection> {
        let handles = self.handles()?;
        Ok(Selection::new(handles.collection, self.registry.config().clone()))
    }

    /// Selection restricted to `keys`.
    pub fn select_keys<I>(&self, keys: I) -> Result<Selection>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.select()?.keys(keys)
    }

    /// Selection of every document except `keys`.
    pub fn select_except<I>(&self, keys: I) -> Result<Selection>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.select()?.except(keys)
    }
}

impl<T> fmt::Debug for Mapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("path", &self.path)
            .field("entity", &std::any::type_name::<T>())
            .finish()
    }
}
