use super::{Mapper, ReadOptions};
use crate::core::{OdmError, Result};
use crate::query::Selection;
use crate::schema::Entity;
use tracing::{Instrument, info_span};

impl<T: Entity> Mapper<T> {
    /// The entity stored under `key`, or `None`.
    pub async fn retrieve(&self, key: &str) -> Result<Option<T>> {
        self.retrieve_with(key, ReadOptions::default()).await
    }

    /// The entity stored under `key`; fails with `Existence` when absent.
    pub async fn retrieve_required(&self, key: &str) -> Result<T> {
        let found = self.retrieve_with(key, ReadOptions::default().required()).await?;
        found.ok_or_else(|| OdmError::Existence(format!("Key {} does not exist", key)))
    }

    pub async fn retrieve_with(&self, key: &str, options: ReadOptions<T>) -> Result<Option<T>> {
        let span = info_span!("mapper.retrieve", collection = %self.path, key = %key);
        self.retrieve_entity(key, options).instrument(span).await
    }

    async fn retrieve_entity(&self, key: &str, options: ReadOptions<T>) -> Result<Option<T>> {
        let key = self.convert_key(key)?;
        let handles = self.handles()?;
        let view = self.compiled(options.view.as_ref())?;

        match handles.collection.get(&key).await? {
            Some(snapshot) => Ok(Some(self.decode(&handles.metadata, snapshot.data, view.as_deref())?)),
            None if options.required => Err(OdmError::Existence(format!("Key {} does not exist", key))),
            None => Ok(None),
        }
    }

    /// Every entity matched by `selection`, in order.
    pub async fn retrieve_all(&self, selection: &Selection) -> Result<Vec<T>> {
        self.retrieve_all_with(selection, ReadOptions::default()).await
    }

    pub async fn retrieve_all_with(&self, selection: &Selection, options: ReadOptions<T>) -> Result<Vec<T>> {
        let span = info_span!("mapper.retrieve_all", collection = %self.path);
        self.retrieve_entities(selection, options).instrument(span).await
    }

    async fn retrieve_entities(&self, selection: &Selection, options: ReadOptions<T>) -> Result<Vec<T>> {
        let handles = self.handles()?;
        self.check_selection(&handles, selection)?;
        let view = self.compiled(options.view.as_ref())?;

        selection
            .documents()
            .await?
            .into_iter()
            .map(|snapshot| self.decode(&handles.metadata, snapshot.data, view.as_deref()))
            .collect()
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let key = self.convert_key(key)?;
        let handles = self.handles()?;
        Ok(handles.collection.exists(&key).await?)
    }
}
