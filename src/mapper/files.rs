use super::Mapper;
use super::options::read_stream;
use crate::core::{OdmError, Result};
use crate::schema::Entity;
use log::debug;
use std::io::Read;

/// Direct access to the blob behind one file field of one document.
///
/// These calls touch only the blob store; the document's file field is
/// left as it is.
impl<T: Entity> Mapper<T> {
    fn file_path(&self, key: &str, name: &str) -> Result<String> {
        let key = self.convert_key(key)?;
        self.metadata()?.require_file(name)?;
        Ok(self.blob_path(&key, name))
    }

    /// Creates the blob and returns its media link; fails if it exists.
    pub async fn upload_file(&self, key: &str, name: &str, reader: impl Read + Send + 'static) -> Result<String> {
        let path = self.file_path(key, name)?;
        let bytes = read_stream(name, reader).await?;
        let handles = self.handles()?;
        if handles.container.get(&path).await?.is_some() {
            return Err(OdmError::Existence(format!("Path {} already exists", path)));
        }
        let info = handles
            .container
            .create(&path, bytes, self.registry.config().blob_access)
            .await?;
        debug!("Uploaded {} ({} bytes)", path, info.size);
        Ok(info.media_link)
    }

    /// Overwrites the blob and returns its new media link; fails if absent.
    pub async fn replace_file(&self, key: &str, name: &str, reader: impl Read + Send + 'static) -> Result<String> {
        let path = self.file_path(key, name)?;
        let bytes = read_stream(name, reader).await?;
        let handles = self.handles()?;
        if handles.container.get(&path).await?.is_none() {
            return Err(OdmError::Existence(format!("Path {} does not exist", path)));
        }
        Ok(handles.container.overwrite(&path, bytes).await?.media_link)
    }

    /// Media link of the blob, or `None` when absent.
    pub async fn file_url(&self, key: &str, name: &str) -> Result<Option<String>> {
        let path = self.file_path(key, name)?;
        let handles = self.handles()?;
        Ok(handles.container.get(&path).await?.map(|info| info.media_link))
    }

    pub async fn file_url_required(&self, key: &str, name: &str) -> Result<String> {
        let path = self.file_path(key, name)?;
        let handles = self.handles()?;
        handles
            .container
            .get(&path)
            .await?
            .map(|info| info.media_link)
            .ok_or_else(|| OdmError::Existence(format!("Path {} does not exist", path)))
    }

    /// Deletes the blob; `false` when it did not exist.
    pub async fn delete_file(&self, key: &str, name: &str) -> Result<bool> {
        let path = self.file_path(key, name)?;
        let handles = self.handles()?;
        if handles.container.get(&path).await?.is_none() {
            return Ok(false);
        }
        Ok(handles.container.delete(&path).await?)
    }

    pub async fn delete_file_required(&self, key: &str, name: &str) -> Result<()> {
        if self.delete_file(key, name).await? {
            Ok(())
        } else {
            let path = self.file_path(key, name)?;
            Err(OdmError::Existence(format!("Path {} does not exist", path)))
        }
    }
}
