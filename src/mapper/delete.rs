use super::Mapper;
use crate::core::{OdmError, Result};
use crate::query::Selection;
use crate::schema::Entity;
use crate::storage::WriteBatch;
use tracing::{Instrument, Level, event, info_span};

impl<T: Entity> Mapper<T> {
    /// Deletes the document under `key`, then the blobs of its file fields.
    ///
    /// Deleting an absent key is a no-op. Blob cleanup is best effort and
    /// never fails the call once the document is gone.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let span = info_span!("mapper.delete", collection = %self.path, key = %key);
        self.delete_entity(key, false).instrument(span).await
    }

    /// Like [`Mapper::delete`], but fails with `Existence` when `key` is absent.
    pub async fn delete_required(&self, key: &str) -> Result<()> {
        let span = info_span!("mapper.delete", collection = %self.path, key = %key);
        self.delete_entity(key, true).instrument(span).await
    }

    async fn delete_entity(&self, key: &str, required: bool) -> Result<()> {
        let key = self.convert_key(key)?;
        let handles = self.handles()?;

        if required && !handles.collection.exists(&key).await? {
            return Err(OdmError::Existence(format!("Key {} does not exist", key)));
        }
        handles.collection.delete(&key).await?;

        let paths = handles
            .metadata
            .file_names()
            .map(|name| self.blob_path(&key, name))
            .collect();
        self.remove_blobs_after_delete(&handles.container, paths).await;
        event!(Level::DEBUG, "entity deleted");
        Ok(())
    }

    /// Deletes every document matched by `selection` in one atomic commit,
    /// then the blobs of their file fields. Returns the number of documents.
    pub async fn delete_all(&self, selection: &Selection) -> Result<usize> {
        let span = info_span!("mapper.delete_all", collection = %self.path);
        self.delete_entities(selection).instrument(span).await
    }

    async fn delete_entities(&self, selection: &Selection) -> Result<usize> {
        let handles = self.handles()?;
        self.check_selection(&handles, selection)?;

        let keys = selection.document_keys().await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut batch = WriteBatch::new();
        let mut paths = Vec::new();
        for key in &keys {
            batch.delete(&self.path, key);
            paths.extend(handles.metadata.file_names().map(|name| self.blob_path(key, name)));
        }
        handles.collection.commit(batch).await?;

        self.remove_blobs_after_delete(&handles.container, paths).await;
        event!(Level::DEBUG, count = keys.len(), "entities deleted");
        Ok(keys.len())
    }
}
