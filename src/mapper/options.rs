use crate::adapter::{View, ViewRef};
use crate::core::{OdmError, Result};
use crate::schema::Entity;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

pub type Stream = Box<dyn Read + Send>;

/// Reads a whole stream on the blocking pool.
pub(crate) async fn read_stream(name: &str, mut reader: impl Read + Send + 'static) -> Result<Vec<u8>> {
    let read = tokio::task::spawn_blocking(move || {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map(|_| bytes)
    })
    .await
    .map_err(|err| OdmError::Io(format!("Reading stream for {} was aborted: {}", name, err)))?;
    read.map_err(|err| OdmError::Io(format!("Reading stream for {} failed: {}", name, err)))
}

/// Content streams for file fields, by field name.
#[derive(Default)]
pub struct Uploads {
    streams: BTreeMap<String, Option<Stream>>,
}

impl Uploads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the content for file field `name`.
    pub fn with(mut self, name: &str, reader: impl Read + Send + 'static) -> Self {
        self.streams.insert(name.to_string(), Some(Box::new(reader)));
        self
    }

    /// Adds a possibly absent stream; an absent one is rejected when used.
    pub fn insert(&mut self, name: &str, stream: Option<Stream>) {
        self.streams.insert(name.to_string(), stream);
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.streams.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }

    pub(crate) fn check_present(&self, name: &str) -> Result<()> {
        match self.streams.get(name) {
            Some(Some(_)) => Ok(()),
            _ => Err(OdmError::Format(format!(
                "Stream for file field {} cannot be null",
                name
            ))),
        }
    }

    /// Drains every stream into memory, in field name order.
    pub(crate) async fn read_all(self) -> Result<Vec<(String, Vec<u8>)>> {
        let mut contents = Vec::with_capacity(self.streams.len());
        for (name, stream) in self.streams {
            let stream = stream.ok_or_else(|| {
                OdmError::Format(format!("Stream for file field {} cannot be null", name))
            })?;
            let bytes = read_stream(&name, stream).await?;
            contents.push((name, bytes));
        }
        Ok(contents)
    }
}

impl fmt::Debug for Uploads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.streams.keys()).finish()
    }
}

/// Options of the create and update operations.
pub struct WriteOptions<T> {
    pub uploads: Uploads,
    pub view: Option<ViewRef<T>>,
}

impl<T: Entity> WriteOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload(mut self, name: &str, reader: impl Read + Send + 'static) -> Self {
        self.uploads = self.uploads.with(name, reader);
        self
    }

    pub fn uploads(mut self, uploads: Uploads) -> Self {
        self.uploads = uploads;
        self
    }

    /// Persists the entity through view `V`.
    pub fn view<V: View<T>>(mut self) -> Self {
        self.view = Some(ViewRef::of::<V>());
        self
    }
}

impl<T> Default for WriteOptions<T> {
    fn default() -> Self {
        Self {
            uploads: Uploads::new(),
            view: None,
        }
    }
}

/// Options of the retrieve operations.
pub struct ReadOptions<T> {
    pub view: Option<ViewRef<T>>,
    /// Fail with `Existence` instead of returning `None`.
    pub required: bool,
}

impl<T: Entity> ReadOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes records through view `V`.
    pub fn view<V: View<T>>(mut self) -> Self {
        self.view = Some(ViewRef::of::<V>());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

impl<T> Default for ReadOptions<T> {
    fn default() -> Self {
        Self {
            view: None,
            required: false,
        }
    }
}

impl<T> Clone for ReadOptions<T> {
    fn clone(&self) -> Self {
        Self {
            view: self.view,
            required: self.required,
        }
    }
}
