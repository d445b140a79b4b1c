pub mod error;
pub mod naming;
pub mod types;
pub mod value;

pub use error::{OdmError, Result};
pub use types::ValueType;
pub use value::{Document, FieldMap};
