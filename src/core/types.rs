use serde_json::Value;
use std::fmt;

/// Declared value type of an entity field or of a view/entity method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Map,
    /// Anything the declaration could not classify, kept by type name.
    Other(String),
}

impl ValueType {
    /// Whether `value` can be stored in a field of this type.
    ///
    /// Null is accepted everywhere; integers widen into floats.
    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::String, Value::String(_)) => true,
            (Self::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Float, Value::Number(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Array, Value::Array(_)) => true,
            (Self::Map, Value::Object(_)) => true,
            (Self::Other(_), _) => true,
            _ => false,
        }
    }

    /// Classifies a Rust type by its last path segment, unwrapping `Option<_>`.
    pub fn from_rust_type(type_name: &str) -> Self {
        let compact: String = type_name.chars().filter(|c| !c.is_whitespace()).collect();
        let inner = compact
            .strip_prefix("Option<")
            .or_else(|| compact.strip_prefix("std::option::Option<"))
            .and_then(|rest| rest.strip_suffix('>'))
            .unwrap_or(&compact);
        let base = inner.split('<').next().unwrap_or(inner);
        let last = base.rsplit("::").next().unwrap_or(base);

        match last {
            "String" | "str" | "&str" | "char" => Self::String,
            "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
            | "u128" | "usize" => Self::Integer,
            "f32" | "f64" => Self::Float,
            "bool" => Self::Boolean,
            "Vec" | "VecDeque" | "HashSet" | "BTreeSet" => Self::Array,
            "HashMap" | "BTreeMap" | "Map" => Self::Map,
            _ => Self::Other(inner.to_string()),
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Self::String)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "STRING"),
            Self::Integer => write!(f, "INTEGER"),
            Self::Float => write!(f, "FLOAT"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Array => write!(f, "ARRAY"),
            Self::Map => write!(f, "MAP"),
            Self::Other(name) => write!(f, "{}", name),
        }
    }
}
