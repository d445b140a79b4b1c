use super::compiler::CompiledView;
use crate::core::{Document, Result};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// An entity seen through a compiled view.
pub struct Adapter<T> {
    entity: T,
    view: Arc<CompiledView<T>>,
}

impl<T> Adapter<T> {
    /// Wraps a freshly constructed entity.
    pub fn new(view: Arc<CompiledView<T>>) -> Self {
        let entity = view.construct();
        Self { entity, view }
    }

    pub fn wrap(view: Arc<CompiledView<T>>, entity: T) -> Self {
        Self { entity, view }
    }

    /// Decodes a document through the view's setters.
    pub fn decode(view: Arc<CompiledView<T>>, document: Document) -> Result<Self> {
        let entity = view.decode(document)?;
        Ok(Self { entity, view })
    }

    pub fn encode(&self) -> Result<Document> {
        self.view.encode(&self.entity)
    }

    /// Invokes a getter declared by the view.
    pub fn call(&self, name: &str) -> Result<Value> {
        self.view.call(&self.entity, name)
    }

    /// Invokes a setter declared by the view.
    pub fn apply(&mut self, name: &str, value: Value) -> Result<()> {
        self.view.apply(&mut self.entity, name, value)
    }

    pub fn view(&self) -> &CompiledView<T> {
        &self.view
    }

    pub fn inner(&self) -> &T {
        &self.entity
    }

    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.entity
    }

    pub fn into_inner(self) -> T {
        self.entity
    }
}

impl<T: fmt::Debug> fmt::Debug for Adapter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("view", &self.view.view_name())
            .field("entity", &self.entity)
            .finish()
    }
}
