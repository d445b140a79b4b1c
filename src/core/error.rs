use thiserror::Error;

/// Failure kinds raised by the mapper and its collaborators.
///
/// Every message names the offending identifier (field, key, path or type).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OdmError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Existence error: {0}")]
    Existence(String),

    #[error("Store execution failed: {0}")]
    Execution(String),

    #[error("Store call interrupted: {0}")]
    Interrupted(String),

    #[error("Access error: {0}")]
    Access(String),

    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock error: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, OdmError>;

impl OdmError {
    /// Malformed input, fixable by the caller.
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_) | Self::Query(_))
    }

    /// Store execution or interruption; the whole operation may be retried.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Execution(_) | Self::Interrupted(_))
    }
}

impl<T> From<std::sync::PoisonError<T>> for OdmError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}

impl From<serde_json::Error> for OdmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for OdmError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
