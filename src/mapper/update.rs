use super::{Handles, Mapper, WriteOptions};
use crate::adapter::{Adapter, CompiledView};
use crate::core::naming::convert_key_value;
use crate::core::{FieldMap, OdmError, Result};
use crate::schema::{Entity, EntityMetadata};
use crate::storage::WriteBatch;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

impl<T: Entity> Mapper<T> {
    /// Replaces the stored document of an existing entity.
    ///
    /// Streams may only target file fields that are null in `entity`. After
    /// the uploads, the blob behind every file field still null is deleted.
    pub async fn update(&self, entity: &mut T) -> Result<()> {
        self.update_with(entity, WriteOptions::default()).await
    }

    pub async fn update_with(&self, entity: &mut T, options: WriteOptions<T>) -> Result<()> {
        let span = info_span!("mapper.update", collection = %self.path);
        self.update_entity(entity, options).instrument(span).await
    }

    async fn update_entity(&self, entity: &mut T, options: WriteOptions<T>) -> Result<()> {
        let handles = self.handles()?;
        let metadata = &handles.metadata;

        let key = self.entity_key(metadata, entity)?;
        self.check_uploads(metadata, entity, &options.uploads)?;
        let view = self.compiled(options.view.as_ref())?;
        self.require_document(&handles, &key).await?;

        let links = self
            .store_uploads(&handles, &key, options.uploads, &mut Vec::new())
            .await?;
        for (name, link) in links {
            metadata.require_file(&name)?.set(entity, Some(link))?;
        }

        let cleared = metadata
            .files()
            .filter(|field| field.get(entity).is_none())
            .map(|field| self.blob_path(&key, field.name()))
            .collect();
        self.remove_blobs(&handles.container, cleared).await?;

        let document = self.encode(metadata, entity, view.as_deref())?;
        handles.collection.set(&key, document).await?;
        event!(Level::DEBUG, key = %key, "entity updated");
        Ok(())
    }

    /// Merges `fields` into an existing document.
    ///
    /// Every name must be a declared field and the key field must be
    /// present. File fields may only appear with a null value, which deletes
    /// their blob; new file content arrives through streams.
    pub async fn update_fields(&self, fields: FieldMap) -> Result<()> {
        self.update_fields_with(fields, WriteOptions::default()).await
    }

    pub async fn update_fields_with(&self, fields: FieldMap, options: WriteOptions<T>) -> Result<()> {
        let span = info_span!("mapper.update_fields", collection = %self.path, count = fields.len());
        self.update_field_map(fields, options).instrument(span).await
    }

    async fn update_field_map(&self, mut fields: FieldMap, options: WriteOptions<T>) -> Result<()> {
        let handles = self.handles()?;
        let metadata = &handles.metadata;

        for name in fields.keys() {
            if metadata.field_type(name).is_none() {
                return Err(OdmError::Format(format!(
                    "Field {} does not exist in type {}",
                    name,
                    metadata.type_name()
                )));
            }
        }

        let key_name = metadata.key().name();
        let raw_key = fields
            .get(key_name)
            .ok_or_else(|| OdmError::Format(format!("Field {} must be in map", key_name)))?;
        let key = convert_key_value(raw_key, self.registry.config().key_byte_limit)?;

        for name in metadata.file_names() {
            match fields.get(name) {
                Some(value) if !value.is_null() => {
                    return Err(OdmError::Format(format!(
                        "File field {} can only be null in map",
                        name
                    )));
                }
                _ => {}
            }
        }

        for name in options.uploads.names() {
            metadata.require_file(name)?;
            if fields.contains_key(name) {
                return Err(OdmError::Format(format!("File field {} cannot be in map", name)));
            }
            options.uploads.check_present(name)?;
        }

        let view = self.compiled(options.view.as_ref())?;
        self.require_document(&handles, &key).await?;

        let links = self
            .store_uploads(&handles, &key, options.uploads, &mut Vec::new())
            .await?;
        for (name, link) in links {
            fields.insert(name, Value::String(link));
        }

        let cleared: BTreeSet<String> = metadata
            .file_names()
            .filter(|name| fields.get(*name).is_some_and(Value::is_null))
            .map(str::to_string)
            .collect();
        let paths = cleared.iter().map(|name| self.blob_path(&key, name)).collect();
        self.remove_blobs(&handles.container, paths).await?;

        if let Some(view) = view {
            transform_fields(metadata, view, &mut fields)?;
        }

        if !cleared.is_empty() {
            let defaults = metadata.to_document(&metadata.construct())?;
            for name in &cleared {
                let empty = defaults.get(name).cloned().unwrap_or(Value::Null);
                fields.insert(name.clone(), empty);
            }
        }

        handles.collection.merge(&key, fields).await?;
        event!(Level::DEBUG, key = %key, "entity fields updated");
        Ok(())
    }

    /// Replaces every stored document in one atomic commit; all keys must exist.
    pub async fn update_many(&self, entities: &[T]) -> Result<()> {
        let span = info_span!("mapper.update_many", collection = %self.path, count = entities.len());
        self.update_entities(entities).instrument(span).await
    }

    async fn update_entities(&self, entities: &[T]) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let handles = self.handles()?;
        let metadata = &handles.metadata;

        let keys = entities
            .iter()
            .map(|entity| self.entity_key(metadata, entity))
            .collect::<Result<Vec<_>>>()?;
        let distinct: BTreeSet<&String> = keys.iter().collect();
        if self.existing_keys(&handles.collection, &keys).await?.len() < distinct.len() {
            return Err(OdmError::Existence("Some keys do not exist".to_string()));
        }

        let mut batch = WriteBatch::new();
        for (key, entity) in keys.iter().zip(entities) {
            batch.set(&self.path, key, metadata.to_document(entity)?);
        }
        handles.collection.commit(batch).await?;
        event!(Level::DEBUG, "entities updated");
        Ok(())
    }

    async fn require_document(&self, handles: &Handles<T>, key: &str) -> Result<()> {
        if !handles.collection.exists(key).await? {
            return Err(OdmError::Existence(format!("Key {} does not exist", key)));
        }
        Ok(())
    }
}

/// Substitutes each field that has a `get_<field>` getter on the view with
/// the getter's result over a default entity carrying the map's values.
fn transform_fields<T: Entity>(
    metadata: &EntityMetadata<T>,
    view: Arc<CompiledView<T>>,
    fields: &mut FieldMap,
) -> Result<()> {
    let mut document = metadata.to_document(&metadata.construct())?;
    for (name, value) in fields.iter() {
        if !value.is_null() {
            document.insert(name.clone(), value.clone());
        }
    }
    let adapter = Adapter::wrap(view, metadata.from_document(document)?);

    for (name, value) in fields.iter_mut() {
        let getter = format!("get_{}", name);
        if adapter.view().has_getter(&getter) {
            *value = adapter.call(&getter)?;
        }
    }
    Ok(())
}
