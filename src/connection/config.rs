use crate::core::naming::{DEFAULT_FIELD_BYTE_LIMIT, DEFAULT_KEY_BYTE_LIMIT};
use crate::storage::BlobAccess;
use std::path::PathBuf;

const URL_SCHEME: &str = "docmapper://";

/// Store instance configuration
///
/// Describes how a [`super::Connector`] reaches one document store and its
/// companion blob bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Blob bucket backing file fields
    pub bucket: String,

    /// Instance name; `None` for the default instance
    pub name: Option<String>,

    /// Service credentials file, read by connectors that need one
    pub credentials: Option<PathBuf>,
}

impl StoreConfig {
    /// Create a configuration for the default instance
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            name: None,
            credentials: None,
        }
    }

    /// Set the instance name
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Set the credentials file
    pub fn credentials(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials = Some(path.into());
        self
    }

    /// Parse from connection string
    ///
    /// Format: "docmapper://bucket[/instance-name]"
    ///
    /// # Examples
    ///
    /// ```
    /// # use docmapper::StoreConfig;
    /// let config = StoreConfig::from_url("docmapper://photos.example.com/analytics").unwrap();
    /// assert_eq!(config.bucket, "photos.example.com");
    /// assert_eq!(config.name.as_deref(), Some("analytics"));
    /// ```
    pub fn from_url(url: &str) -> Result<Self, String> {
        let rest = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| format!("URL must start with '{}'", URL_SCHEME))?;

        let mut parts = rest.splitn(2, '/');
        let bucket = parts.next().unwrap_or_default();
        if bucket.is_empty() {
            return Err("URL must name a bucket".to_string());
        }

        let config = Self::new(bucket);
        let config = match parts.next() {
            Some(name) if name.contains('/') => {
                return Err("Invalid instance name format".to_string());
            }
            Some(name) if !name.is_empty() => config.name(name),
            _ => config,
        };

        config.validate()?;
        Ok(config)
    }

    /// Convert to connection string
    pub fn to_url(&self) -> String {
        match &self.name {
            Some(name) => format!("{}{}/{}", URL_SCHEME, self.bucket, name),
            None => format!("{}{}", URL_SCHEME, self.bucket),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.bucket.trim().is_empty() {
            return Err("Bucket cannot be blank".to_string());
        }

        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err("Name cannot be blank".to_string());
            }
        }

        if let Some(path) = &self.credentials {
            if path.as_os_str().is_empty() {
                return Err("Credentials path cannot be blank".to_string());
            }
        }

        Ok(())
    }
}

/// Mapper-wide validation limits and blob policy
#[derive(Debug, Clone, PartialEq)]
pub struct OdmConfig {
    /// Maximum key (and collection path) length in bytes
    pub key_byte_limit: usize,

    /// Maximum field name length in bytes for filters and ordering
    pub field_byte_limit: usize,

    /// Access granted to blobs created for file fields
    pub blob_access: BlobAccess,
}

impl Default for OdmConfig {
    fn default() -> Self {
        Self {
            key_byte_limit: DEFAULT_KEY_BYTE_LIMIT,
            field_byte_limit: DEFAULT_FIELD_BYTE_LIMIT,
            blob_access: BlobAccess::PublicRead,
        }
    }
}

impl OdmConfig {
    pub fn key_byte_limit(mut self, limit: usize) -> Self {
        self.key_byte_limit = limit;
        self
    }

    pub fn field_byte_limit(mut self, limit: usize) -> Self {
        self.field_byte_limit = limit;
        self
    }

    pub fn blob_access(mut self, access: BlobAccess) -> Self {
        self.blob_access = access;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.key_byte_limit == 0 {
            return Err("key_byte_limit must be > 0".to_string());
        }

        if self.field_byte_limit == 0 {
            return Err("field_byte_limit must be > 0".to_string());
        }

        Ok(())
    }
}
