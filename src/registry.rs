use crate::adapter::{Adapter, AdapterCache, CompiledView, View, ViewRef};
use crate::connection::{OdmConfig, StoreManager};
use crate::core::{OdmError, Result};
use crate::mapper::Mapper;
use crate::schema::{Entity, EntityMetadata, MetadataCache};
use std::sync::Arc;

/// Shared state of every mapper in the process.
///
/// Build one at startup, wrap it in an `Arc`, and hand clones to whatever
/// needs mappers. It owns the metadata cache, the compiled view cache, the
/// configured store instances and the validation limits.
///
/// ```ignore
/// let registry = Arc::new(Registry::new());
/// registry
///     .stores()
///     .create(StoreConfig::new("media"), Arc::new(MemoryConnector::new()))?
///     .connect()?;
/// let items: Mapper<Item> = registry.mapper("items")?;
/// ```
#[derive(Default)]
pub struct Registry {
    metadata: MetadataCache,
    adapters: AdapterCache,
    stores: StoreManager,
    config: OdmConfig,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OdmConfig) -> Result<Self> {
        config.validate().map_err(OdmError::Format)?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &OdmConfig {
        &self.config
    }

    pub fn stores(&self) -> &StoreManager {
        &self.stores
    }

    /// Metadata of `T`, extracted on first request.
    pub fn metadata<T: Entity>(&self) -> Result<Arc<EntityMetadata<T>>> {
        self.metadata.get::<T>()
    }

    pub fn metadata_cache(&self) -> &MetadataCache {
        &self.metadata
    }

    /// Compiled form of `view`, compiled on first request.
    pub fn view<T: Entity>(&self, view: &ViewRef<T>) -> Result<Arc<CompiledView<T>>> {
        let metadata = self.metadata::<T>()?;
        self.adapters.get(&metadata, view)
    }

    pub fn adapter_cache(&self) -> &AdapterCache {
        &self.adapters
    }

    /// A default-constructed `T` seen through view `V`.
    pub fn adapter<T: Entity, V: View<T>>(&self) -> Result<Adapter<T>> {
        Ok(Adapter::new(self.view(&ViewRef::of::<V>())?))
    }

    /// `entity` seen through view `V`.
    pub fn wrap<T: Entity, V: View<T>>(&self, entity: T) -> Result<Adapter<T>> {
        Ok(Adapter::wrap(self.view(&ViewRef::of::<V>())?, entity))
    }

    pub fn mapper<T: Entity>(self: &Arc<Self>, path: &str) -> Result<Mapper<T>> {
        Mapper::new(Arc::clone(self), path)
    }
}
