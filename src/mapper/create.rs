use super::{Mapper, WriteOptions};
use crate::connection::BlobContainer;
use crate::core::{OdmError, Result};
use crate::schema::{Entity, EntityMetadata};
use crate::storage::WriteBatch;
use log::warn;
use std::collections::BTreeSet;
use tracing::{Instrument, Level, event, info_span};

impl<T: Entity> Mapper<T> {
    /// Stores a new entity and returns its key.
    ///
    /// An autokey entity must arrive with a null key and leaves with the
    /// store-generated one. An explicit key must not exist yet; the check and
    /// the write are two separate store calls, so concurrent creators of the
    /// same key can both pass the check.
    ///
    /// When an upload or the document write fails, the generated key and the
    /// file links are reset on `entity` and the blobs this call created are
    /// removed, so the same entity can be retried.
    pub async fn create(&self, entity: &mut T) -> Result<String> {
        self.create_with(entity, WriteOptions::default()).await
    }

    pub async fn create_with(&self, entity: &mut T, options: WriteOptions<T>) -> Result<String> {
        let span = info_span!("mapper.create", collection = %self.path);
        self.create_entity(entity, options).instrument(span).await
    }

    async fn create_entity(&self, entity: &mut T, options: WriteOptions<T>) -> Result<String> {
        let handles = self.handles()?;
        let metadata = &handles.metadata;

        let explicit_key = if metadata.is_auto_key() {
            if metadata.key().get(entity).is_some() {
                return Err(OdmError::Format("Key must be null in entity".to_string()));
            }
            None
        } else {
            Some(self.entity_key(metadata, entity)?)
        };
        self.check_uploads(metadata, entity, &options.uploads)?;
        let view = self.compiled(options.view.as_ref())?;

        let auto_key = explicit_key.is_none();
        let key = match explicit_key {
            Some(key) => {
                if handles.collection.exists(&key).await? {
                    return Err(OdmError::Existence(format!("Key {} already exists", key)));
                }
                key
            }
            None => handles.collection.generate_id(),
        };

        let uploads = options.uploads;
        let file_names: Vec<String> = uploads.names().map(str::to_string).collect();
        let mut created = Vec::new();
        let written = async {
            if auto_key {
                metadata.key().set(entity, Some(key.clone()))?;
            }
            let links = self.store_uploads(&handles, &key, uploads, &mut created).await?;
            for (name, link) in links {
                metadata.require_file(&name)?.set(entity, Some(link))?;
            }
            let document = self.encode(metadata, entity, view.as_deref())?;
            handles.collection.set(&key, document).await?;
            Ok::<(), OdmError>(())
        }
        .await;

        if let Err(err) = written {
            reset_fields(metadata, entity, auto_key, &file_names);
            self.discard_blobs(&handles.container, created).await;
            return Err(err);
        }
        event!(Level::DEBUG, key = %key, "entity created");
        Ok(key)
    }

    async fn discard_blobs(&self, container: &BlobContainer, paths: Vec<String>) {
        if let Err(err) = self.remove_blobs(container, paths).await {
            warn!(
                "uploaded blobs left behind after failed create: collection='{}' error='{}'",
                self.path, err
            );
        }
    }

    /// Stores every entity in one atomic commit; returns the keys in order.
    ///
    /// Autokey entities must all arrive with null keys. Explicit keys are
    /// checked with one membership query; any hit rejects the whole batch.
    pub async fn create_many(&self, entities: &mut [T]) -> Result<Vec<String>> {
        let span = info_span!("mapper.create_many", collection = %self.path, count = entities.len());
        self.create_entities(entities).instrument(span).await
    }

    async fn create_entities(&self, entities: &mut [T]) -> Result<Vec<String>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let handles = self.handles()?;
        let metadata = &handles.metadata;

        let auto_key = metadata.is_auto_key();
        let keys = if auto_key {
            if entities.iter().any(|entity| metadata.key().get(entity).is_some()) {
                return Err(OdmError::Format("All keys must be null in entities".to_string()));
            }
            entities
                .iter()
                .map(|_| handles.collection.generate_id())
                .collect::<Vec<_>>()
        } else {
            let keys = entities
                .iter()
                .map(|entity| self.entity_key(metadata, entity))
                .collect::<Result<Vec<_>>>()?;
            let mut seen = BTreeSet::new();
            if let Some(repeated) = keys.iter().find(|key| !seen.insert(key.as_str())) {
                return Err(OdmError::Existence(format!(
                    "Key {} appears more than once in entities",
                    repeated
                )));
            }
            if !self.existing_keys(&handles.collection, &keys).await?.is_empty() {
                return Err(OdmError::Existence("Some keys already exist".to_string()));
            }
            keys
        };

        let written = async {
            let mut batch = WriteBatch::new();
            for (key, entity) in keys.iter().zip(entities.iter_mut()) {
                if auto_key {
                    metadata.key().set(entity, Some(key.clone()))?;
                }
                batch.set(&self.path, key, metadata.to_document(entity)?);
            }
            handles.collection.commit(batch).await?;
            Ok::<(), OdmError>(())
        }
        .await;

        if let Err(err) = written {
            for entity in entities.iter_mut() {
                reset_fields(metadata, entity, auto_key, &[]);
            }
            return Err(err);
        }
        event!(Level::DEBUG, count = keys.len(), "entities created");
        Ok(keys)
    }
}

/// Puts back the null key and file fields a failed create had filled in.
fn reset_fields<T>(metadata: &EntityMetadata<T>, entity: &mut T, auto_key: bool, files: &[String]) {
    if auto_key {
        if let Err(err) = metadata.key().set(entity, None) {
            warn!("could not reset key of {}: {}", metadata.type_name(), err);
        }
    }
    for name in files {
        if let Some(field) = metadata.file(name) {
            if let Err(err) = field.set(entity, None) {
                warn!("could not reset file field {} of {}: {}", name, metadata.type_name(), err);
            }
        }
    }
}
