use super::view::ViewRef;
use crate::core::{Document, OdmError, Result};
use crate::schema::entity::{GetterFn, SetterFn};
use crate::schema::{Entity, EntityMetadata, MethodBody, Signature};
use log::debug;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

/// Dispatch table synthesized for one (entity type, view type) pair.
pub struct CompiledView<T> {
    view_name: &'static str,
    entity_name: String,
    constructor: fn() -> T,
    getters: HashMap<String, GetterFn<T>>,
    setters: HashMap<String, SetterFn<T>>,
    /// Property name to getter, for encoding
    properties: BTreeMap<String, GetterFn<T>>,
    /// Property name to setter, for decoding
    assignments: BTreeMap<String, SetterFn<T>>,
}

/// Property named by a getter: `get_name` and `is_name` both give `name`.
pub fn getter_property(method: &str) -> Option<&str> {
    method
        .strip_prefix("get_")
        .or_else(|| method.strip_prefix("is_"))
        .filter(|property| !property.is_empty())
}

pub fn setter_property(method: &str) -> Option<&str> {
    method.strip_prefix("set_").filter(|property| !property.is_empty())
}

impl<T: Entity> CompiledView<T> {
    pub fn compile(metadata: &EntityMetadata<T>, view: &ViewRef<T>) -> Result<Self> {
        let view_name = view.type_name();
        let entity_name = metadata.type_name();

        if view.size() != 0 {
            return Err(OdmError::Format(format!("View {} cannot have fields", view_name)));
        }

        let mut compiled = Self {
            view_name,
            entity_name: entity_name.to_string(),
            constructor: metadata.constructor(),
            getters: HashMap::new(),
            setters: HashMap::new(),
            properties: BTreeMap::new(),
            assignments: BTreeMap::new(),
        };

        for method in view.methods() {
            let name = method.name.trim();
            if name.is_empty() {
                return Err(OdmError::Adapter(format!(
                    "View {} declares a method without a name",
                    view_name
                )));
            }
            if compiled.getters.contains_key(name) || compiled.setters.contains_key(name) {
                return Err(OdmError::Adapter(format!(
                    "View {} declares method {} twice",
                    view_name, name
                )));
            }

            let body = match method.body {
                Some(body) => body,
                None => {
                    let target = metadata.method(name).ok_or_else(|| {
                        OdmError::Adapter(format!(
                            "Method {} of view {} has no counterpart in type {}",
                            name, view_name, entity_name
                        ))
                    })?;
                    if target.signature != method.signature {
                        return Err(OdmError::Adapter(format!(
                            "Method {} of view {} is declared as {} but type {} defines it as {}",
                            name, view_name, method.signature, entity_name, target.signature
                        )));
                    }
                    target.body
                }
            };

            match (&method.signature, body) {
                (Signature::Getter(_), MethodBody::Getter(get)) => {
                    if let Some(property) = getter_property(name) {
                        if compiled.properties.insert(property.to_string(), get).is_some() {
                            return Err(OdmError::Adapter(format!(
                                "View {} declares more than one getter for {}",
                                view_name, property
                            )));
                        }
                    }
                    compiled.getters.insert(name.to_string(), get);
                }
                (Signature::Setter(_), MethodBody::Setter(set)) => {
                    if let Some(property) = setter_property(name) {
                        compiled.assignments.insert(property.to_string(), set);
                    }
                    compiled.setters.insert(name.to_string(), set);
                }
                (signature, _) => {
                    return Err(OdmError::Adapter(format!(
                        "Method {} of view {} has a body that does not match {}",
                        name, view_name, signature
                    )));
                }
            }
        }

        debug!(
            "Compiled view {} over {}: {} getter(s), {} setter(s)",
            view_name,
            entity_name,
            compiled.getters.len(),
            compiled.setters.len()
        );
        Ok(compiled)
    }
}

impl<T> CompiledView<T> {
    pub fn view_name(&self) -> &'static str {
        self.view_name
    }

    pub fn construct(&self) -> T {
        (self.constructor)()
    }

    pub fn has_getter(&self, name: &str) -> bool {
        self.getters.contains_key(name)
    }

    pub fn has_setter(&self, name: &str) -> bool {
        self.setters.contains_key(name)
    }

    /// Names of the properties the view encodes.
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn call(&self, entity: &T, name: &str) -> Result<Value> {
        let get = self.getters.get(name).ok_or_else(|| {
            OdmError::Adapter(format!("View {} has no getter {}", self.view_name, name))
        })?;
        get(entity)
    }

    pub fn apply(&self, entity: &mut T, name: &str, value: Value) -> Result<()> {
        let set = self.setters.get(name).ok_or_else(|| {
            OdmError::Adapter(format!("View {} has no setter {}", self.view_name, name))
        })?;
        set(entity, value)
    }

    /// Document made of every getter property of the view.
    pub fn encode(&self, entity: &T) -> Result<Document> {
        let mut document = Document::new();
        for (property, get) in &self.properties {
            document.insert(property.clone(), get(entity)?);
        }
        Ok(document)
    }

    /// Fresh entity with every document property the view can assign.
    pub fn decode(&self, document: Document) -> Result<T> {
        let mut entity = self.construct();
        for (property, value) in document {
            if let Some(set) = self.assignments.get(&property) {
                set(&mut entity, value)?;
            }
        }
        Ok(entity)
    }
}

impl<T> fmt::Debug for CompiledView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledView")
            .field("view", &self.view_name)
            .field("entity", &self.entity_name)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}

type Compiled = std::result::Result<Arc<dyn Any + Send + Sync>, OdmError>;

/// Cache of compiled views keyed by (entity type, view type).
///
/// Each key owns one `OnceLock`: concurrent first callers block on a single
/// compilation and all receive the same `Arc`. A failed compilation is kept
/// and returned to every later caller.
#[derive(Default)]
pub struct AdapterCache {
    slots: Mutex<HashMap<(TypeId, TypeId), Arc<OnceLock<Compiled>>>>,
}

impl AdapterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Entity>(
        &self,
        metadata: &EntityMetadata<T>,
        view: &ViewRef<T>,
    ) -> Result<Arc<CompiledView<T>>> {
        let slot = {
            let mut slots = self.slots.lock()?;
            Arc::clone(
                slots
                    .entry((TypeId::of::<T>(), view.type_id()))
                    .or_insert_with(|| Arc::new(OnceLock::new())),
            )
        };

        let compiled = slot.get_or_init(|| {
            CompiledView::compile(metadata, view)
                .map(|compiled| Arc::new(compiled) as Arc<dyn Any + Send + Sync>)
        });

        match compiled {
            Ok(compiled) => Arc::clone(compiled).downcast::<CompiledView<T>>().map_err(|_| {
                OdmError::Adapter(format!(
                    "Cached view {} does not belong to {}",
                    view.type_name(),
                    metadata.type_name()
                ))
            }),
            Err(err) => Err(err.clone()),
        }
    }

    /// Number of (entity type, view type) pairs seen so far.
    pub fn len(&self) -> Result<usize> {
        Ok(self.slots.lock()?.len())
    }
}
