//! Validation of keys, collection paths, blob names and field names.

use super::{OdmError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

pub const DEFAULT_KEY_BYTE_LIMIT: usize = 1500;
pub const DEFAULT_FIELD_BYTE_LIMIT: usize = 1500;

lazy_static! {
    static ref RESERVED_KEY: Regex = Regex::new(r"^__.*__$").expect("reserved key pattern");
    static ref FIELD_PATH: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").expect("field path pattern");
}

/// Trims and validates a document key or collection path segment.
///
/// `what` names the kind of identifier in error messages ("Key", "Path").
pub fn clean_key(what: &str, raw: &str, byte_limit: usize) -> Result<String> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(OdmError::Format(format!("{} cannot be blank", what)));
    }
    if key.len() > byte_limit {
        return Err(OdmError::Format(format!(
            "{} {} cannot have more than {} bytes",
            what, key, byte_limit
        )));
    }
    if key.contains('/') {
        return Err(OdmError::Format(format!("{} {} cannot have slashes", what, key)));
    }
    if key == "." || key == ".." {
        return Err(OdmError::Format(format!(
            "{} cannot be a single point or double points",
            what
        )));
    }
    if RESERVED_KEY.is_match(key) {
        return Err(OdmError::Format(format!(
            "{} {} cannot match the regular expression {}",
            what,
            key,
            RESERVED_KEY.as_str()
        )));
    }
    Ok(key.to_string())
}

/// Converts an optional key value (null allowed at the call site) into a clean key.
pub fn convert_key(raw: Option<&str>, byte_limit: usize) -> Result<String> {
    match raw {
        Some(raw) => clean_key("Key", raw, byte_limit),
        None => Err(OdmError::Format("Key cannot be null".to_string())),
    }
}

/// Converts a field-map key value into a clean key.
///
/// Numbers and booleans are accepted through their textual form.
pub fn convert_key_value(raw: &Value, byte_limit: usize) -> Result<String> {
    match raw {
        Value::Null => Err(OdmError::Format("Key cannot be null".to_string())),
        Value::String(s) => clean_key("Key", s, byte_limit),
        Value::Number(n) => clean_key("Key", &n.to_string(), byte_limit),
        Value::Bool(b) => clean_key("Key", &b.to_string(), byte_limit),
        other => Err(OdmError::Format(format!(
            "Key cannot be a {}",
            super::value::kind_name(other)
        ))),
    }
}

/// Validates a field name used in a filter or ordering clause.
pub fn check_field(name: &str, byte_limit: usize) -> Result<&str> {
    if name.trim().is_empty() {
        return Err(OdmError::Format("Field name cannot be blank".to_string()));
    }
    if name.len() > byte_limit {
        return Err(OdmError::Format(format!(
            "Field name {} cannot have more than {} bytes",
            name, byte_limit
        )));
    }
    if !FIELD_PATH.is_match(name) {
        return Err(OdmError::Format(format!(
            "Field name {} must match the regular expression {}",
            name,
            FIELD_PATH.as_str()
        )));
    }
    Ok(name)
}

/// Validates the candidate list of a membership filter.
pub fn check_candidates(values: &[Value]) -> Result<()> {
    if values.is_empty() {
        return Err(OdmError::Format("List of values cannot be empty".to_string()));
    }
    Ok(())
}

/// Builds the blob path `{path}/{key}/{name}` backing a file field.
pub fn blob_path(path: &str, key: &str, name: &str) -> String {
    format!("{}/{}/{}", path, key, name)
}
