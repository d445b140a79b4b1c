//! Declaration side of an entity type: the fields, markers, accessors and
//! methods a type registers through [`Entity::schema`].
//!
//! Usually generated by `#[derive(Entity)]`; hand-written schemas are
//! equally valid.

use crate::core::{Result, ValueType};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// A type the mapper can persist.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn schema() -> EntitySchema<Self>;
}

/// Reads a field as text; `None` for null and for empty strings.
pub type FieldGetter<T> = fn(&T) -> Option<String>;

/// Writes a field from text; `None` clears it.
pub type FieldSetter<T> = fn(&mut T, Option<String>) -> Result<()>;

/// Caller-supplied access to one field.
pub struct FieldAccessor<T> {
    pub get: FieldGetter<T>,
    pub set: Option<FieldSetter<T>>,
}

impl<T> Clone for FieldAccessor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldAccessor<T> {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldMarkers {
    pub key: bool,
    pub autokey: bool,
    pub file: bool,
}

pub struct FieldSpec<T> {
    pub name: String,
    pub value_type: ValueType,
    pub markers: FieldMarkers,
    pub accessor: Option<FieldAccessor<T>>,
}

impl<T> FieldSpec<T> {
    pub fn new(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            markers: FieldMarkers::default(),
            accessor: None,
        }
    }

    pub fn key(mut self) -> Self {
        self.markers.key = true;
        self
    }

    pub fn autokey(mut self) -> Self {
        self.markers.autokey = true;
        self
    }

    pub fn file(mut self) -> Self {
        self.markers.file = true;
        self
    }

    pub fn accessor(mut self, get: FieldGetter<T>, set: Option<FieldSetter<T>>) -> Self {
        self.accessor = Some(FieldAccessor { get, set });
        self
    }
}

impl<T> fmt::Debug for FieldSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("markers", &self.markers)
            .field("accessor", &self.accessor.is_some())
            .finish()
    }
}

/// Shape of an entity or view method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Signature {
    /// No argument, returns a value of the type.
    Getter(ValueType),
    /// One argument of the type, returns nothing.
    Setter(ValueType),
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Getter(ty) => write!(f, "() -> {}", ty),
            Self::Setter(ty) => write!(f, "({}) -> ()", ty),
        }
    }
}

pub type GetterFn<T> = fn(&T) -> Result<Value>;
pub type SetterFn<T> = fn(&mut T, Value) -> Result<()>;

pub enum MethodBody<T> {
    Getter(GetterFn<T>),
    Setter(SetterFn<T>),
}

impl<T> Clone for MethodBody<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MethodBody<T> {}

/// A named method on the entity, callable by name from a view.
pub struct EntityMethod<T> {
    pub name: String,
    pub signature: Signature,
    pub body: MethodBody<T>,
}

impl<T> EntityMethod<T> {
    pub fn getter(name: &str, value_type: ValueType, body: GetterFn<T>) -> Self {
        Self {
            name: name.to_string(),
            signature: Signature::Getter(value_type),
            body: MethodBody::Getter(body),
        }
    }

    pub fn setter(name: &str, value_type: ValueType, body: SetterFn<T>) -> Self {
        Self {
            name: name.to_string(),
            signature: Signature::Setter(value_type),
            body: MethodBody::Setter(body),
        }
    }
}

impl<T> Clone for EntityMethod<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            signature: self.signature.clone(),
            body: self.body,
        }
    }
}

impl<T> fmt::Debug for EntityMethod<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.signature)
    }
}

/// Everything an entity type declares about itself.
pub struct EntitySchema<T> {
    pub type_name: String,
    /// Zero-argument constructor; required for decoding through views.
    pub constructor: Option<fn() -> T>,
    pub fields: Vec<FieldSpec<T>>,
    pub methods: Vec<EntityMethod<T>>,
}

impl<T> EntitySchema<T> {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            constructor: None,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn constructor(mut self, constructor: fn() -> T) -> Self {
        self.constructor = Some(constructor);
        self
    }

    pub fn field(mut self, field: FieldSpec<T>) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: EntityMethod<T>) -> Self {
        self.methods.push(method);
        self
    }
}

/// Text form of a key or file value.
pub fn read_text<V: Serialize + ?Sized>(value: &V) -> Option<String> {
    match serde_json::to_value(value).ok()? {
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Stores text into a field; `None` resets it to its default (empty or `None`).
pub fn write_text<V: DeserializeOwned + Default>(slot: &mut V, text: Option<String>) -> Result<()> {
    *slot = match text {
        Some(text) => serde_json::from_value(Value::String(text))?,
        None => V::default(),
    };
    Ok(())
}

pub fn encode_value<V: Serialize + ?Sized>(value: &V) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

pub fn decode_value<V: DeserializeOwned>(value: Value) -> Result<V> {
    Ok(serde_json::from_value(value)?)
}
