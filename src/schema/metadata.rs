use super::entity::{Entity, EntityMethod, FieldAccessor, FieldSpec};
use crate::core::{Document, OdmError, Result, ValueType};
use log::debug;
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Resolved access to a key or file field.
pub struct FieldDescriptor<T> {
    name: String,
    value_type: ValueType,
    accessor: FieldAccessor<T>,
    type_name: String,
}

impl<T> FieldDescriptor<T> {
    fn resolve(spec: &FieldSpec<T>, type_name: &str) -> Result<Self> {
        let accessor = spec.accessor.ok_or_else(|| {
            OdmError::Access(format!(
                "Field {} of type {} exposes no accessor",
                spec.name, type_name
            ))
        })?;
        Ok(Self {
            name: spec.name.clone(),
            value_type: spec.value_type.clone(),
            accessor,
            type_name: type_name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn get(&self, entity: &T) -> Option<String> {
        (self.accessor.get)(entity)
    }

    pub fn set(&self, entity: &mut T, value: Option<String>) -> Result<()> {
        let set = self.accessor.set.ok_or_else(|| {
            OdmError::Access(format!(
                "Field {} of type {} cannot be written",
                self.name, self.type_name
            ))
        })?;
        set(entity, value)
    }
}

impl<T> fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .finish()
    }
}

/// Immutable storage description of one entity type.
pub struct EntityMetadata<T> {
    type_id: TypeId,
    type_name: String,
    key: FieldDescriptor<T>,
    auto_key: bool,
    files: BTreeMap<String, FieldDescriptor<T>>,
    fields: BTreeMap<String, ValueType>,
    constructor: fn() -> T,
    methods: HashMap<String, EntityMethod<T>>,
}

impl<T: Entity> EntityMetadata<T> {
    /// Inspects `T`'s schema and validates its markers.
    pub fn extract() -> Result<Self> {
        let schema = T::schema();
        let type_name = schema.type_name;

        let constructor = schema.constructor.ok_or_else(|| {
            OdmError::Schema(format!(
                "Type {} must have a zero-argument constructor",
                type_name
            ))
        })?;

        let mut key: Option<&FieldSpec<T>> = None;
        let mut auto_key = false;
        let mut file_specs = Vec::new();
        let mut fields = BTreeMap::new();

        for spec in &schema.fields {
            let name = &spec.name;
            if fields.insert(name.clone(), spec.value_type.clone()).is_some() {
                return Err(OdmError::Schema(format!(
                    "Type {} declares field {} twice",
                    type_name, name
                )));
            }

            let markers = spec.markers;
            if markers.key && markers.autokey {
                return Err(OdmError::Schema(format!(
                    "Field {} of type {} cannot be both a key and an autokey",
                    name, type_name
                )));
            }

            if markers.key {
                if key.is_some() {
                    let message = if auto_key {
                        format!("Type {} cannot have both an autokey and a key", type_name)
                    } else {
                        format!("Type {} cannot have more than one key", type_name)
                    };
                    return Err(OdmError::Schema(message));
                }
                key = Some(spec);
            } else if markers.autokey {
                if key.is_some() {
                    let message = if auto_key {
                        format!("Type {} cannot have more than one autokey", type_name)
                    } else {
                        format!("Type {} cannot have both a key and an autokey", type_name)
                    };
                    return Err(OdmError::Schema(message));
                }
                if !spec.value_type.is_string() {
                    return Err(OdmError::Schema(format!(
                        "Autokey {} of type {} must be a string",
                        name, type_name
                    )));
                }
                auto_key = true;
                key = Some(spec);
            }

            if markers.file {
                if !spec.value_type.is_string() {
                    return Err(OdmError::Schema(format!(
                        "File {} of type {} must be a string",
                        name, type_name
                    )));
                }
                file_specs.push(spec);
            }
        }

        let key = key.ok_or_else(|| {
            OdmError::Schema(format!(
                "Type {} must have either a key or an autokey",
                type_name
            ))
        })?;
        let key = FieldDescriptor::resolve(key, &type_name)?;

        let files = file_specs
            .into_iter()
            .map(|spec| Ok((spec.name.clone(), FieldDescriptor::resolve(spec, &type_name)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        let mut methods = HashMap::new();
        for method in schema.methods {
            if methods.contains_key(&method.name) {
                return Err(OdmError::Schema(format!(
                    "Type {} declares method {} twice",
                    type_name, method.name
                )));
            }
            methods.insert(method.name.clone(), method);
        }

        debug!(
            "Extracted metadata for {}: key={} auto={} files={:?}",
            type_name,
            key.name(),
            auto_key,
            files.keys().collect::<Vec<_>>()
        );

        Ok(Self {
            type_id: TypeId::of::<T>(),
            type_name,
            key,
            auto_key,
            files,
            fields,
            constructor,
            methods,
        })
    }
}

impl<T> EntityMetadata<T> {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn key(&self) -> &FieldDescriptor<T> {
        &self.key
    }

    pub fn is_auto_key(&self) -> bool {
        self.auto_key
    }

    pub fn file(&self, name: &str) -> Option<&FieldDescriptor<T>> {
        self.files.get(name)
    }

    pub fn files(&self) -> impl Iterator<Item = &FieldDescriptor<T>> {
        self.files.values()
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn is_file(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Declared type of a field, `None` when the field is not declared.
    pub fn field_type(&self, name: &str) -> Option<&ValueType> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn method(&self, name: &str) -> Option<&EntityMethod<T>> {
        self.methods.get(name)
    }

    pub fn constructor(&self) -> fn() -> T {
        self.constructor
    }

    pub fn construct(&self) -> T {
        (self.constructor)()
    }

    /// Fails with `Format` when `name` is not a declared file field.
    pub fn require_file(&self, name: &str) -> Result<&FieldDescriptor<T>> {
        self.file(name).ok_or_else(|| {
            OdmError::Format(format!(
                "File field {} does not exist in type {}",
                name, self.type_name
            ))
        })
    }
}

impl<T: Entity> EntityMetadata<T> {
    pub fn to_document(&self, entity: &T) -> Result<Document> {
        match serde_json::to_value(entity)? {
            serde_json::Value::Object(document) => Ok(document),
            other => Err(OdmError::Serialization(format!(
                "Type {} must serialize to a map, got {}",
                self.type_name,
                crate::core::value::kind_name(&other)
            ))),
        }
    }

    pub fn from_document(&self, document: Document) -> Result<T> {
        Ok(serde_json::from_value(serde_json::Value::Object(document))?)
    }
}

impl<T> fmt::Debug for EntityMetadata<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMetadata")
            .field("type_name", &self.type_name)
            .field("key", &self.key)
            .field("auto_key", &self.auto_key)
            .field("files", &self.files.keys().collect::<Vec<_>>())
            .finish()
    }
}
