use super::entity::Entity;
use super::metadata::EntityMetadata;
use crate::core::{OdmError, Result};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type Slot = Arc<dyn Any + Send + Sync>;

/// Process-lifetime cache of extracted metadata, one entry per entity type.
///
/// Only successful extractions are stored; a failing type is re-validated
/// (and fails again) on every request.
#[derive(Default)]
pub struct MetadataCache {
    entries: RwLock<HashMap<TypeId, Slot>>,
}

fn downcast<T: Entity>(slot: Slot) -> Result<Arc<EntityMetadata<T>>> {
    slot.downcast::<EntityMetadata<T>>().map_err(|_| {
        OdmError::Schema(format!(
            "Cached metadata does not belong to {}",
            std::any::type_name::<T>()
        ))
    })
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Entity>(&self) -> Result<Arc<EntityMetadata<T>>> {
        let type_id = TypeId::of::<T>();
        if let Some(slot) = self.entries.read()?.get(&type_id).cloned() {
            return downcast(slot);
        }

        let extracted: Slot = Arc::new(EntityMetadata::<T>::extract()?);
        let slot = {
            let mut entries = self.entries.write()?;
            // A concurrent caller may have won; keep its entry
            Arc::clone(entries.entry(type_id).or_insert(extracted))
        };
        downcast(slot)
    }

    pub fn contains<T: Entity>(&self) -> Result<bool> {
        Ok(self.entries.read()?.contains_key(&TypeId::of::<T>()))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.read()?.len())
    }
}
