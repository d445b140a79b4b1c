use super::{Connector, StoreConfig, StoreInstance};
use crate::core::{OdmError, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Owns the configured store instances: one optional default plus named ones.
///
/// Constructed once at startup as part of a [`crate::Registry`].
#[derive(Debug, Default)]
pub struct StoreManager {
    default: RwLock<Option<Arc<StoreInstance>>>,
    named: RwLock<HashMap<String, Arc<StoreInstance>>>,
}

fn check_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(OdmError::Connection("Name cannot be blank".to_string()));
    }
    Ok(name)
}

impl StoreManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new instance; the configuration's name selects the slot.
    pub fn create(&self, config: StoreConfig, connector: Arc<dyn Connector>) -> Result<Arc<StoreInstance>> {
        config.validate().map_err(OdmError::Connection)?;

        match config.name.clone() {
            None => {
                let mut default = self.default.write()?;
                if default.is_some() {
                    return Err(OdmError::Connection(
                        "Already built a default store instance".to_string(),
                    ));
                }
                let instance = Arc::new(StoreInstance::new(config, connector));
                *default = Some(Arc::clone(&instance));
                Ok(instance)
            }
            Some(name) => {
                let name = check_name(&name)?.to_string();
                let mut named = self.named.write()?;
                if named.contains_key(&name) {
                    return Err(OdmError::Connection(format!(
                        "Already built a store instance named {}",
                        name
                    )));
                }
                let instance = Arc::new(StoreInstance::new(config, connector));
                named.insert(name, Arc::clone(&instance));
                Ok(instance)
            }
        }
    }

    /// `None` selects the default instance.
    pub fn get(&self, name: Option<&str>) -> Result<Arc<StoreInstance>> {
        match name {
            None => self.default.read()?.clone().ok_or_else(|| {
                OdmError::Connection("A default store instance does not exist".to_string())
            }),
            Some(name) => {
                let name = check_name(name)?;
                self.named.read()?.get(name).cloned().ok_or_else(|| {
                    OdmError::Connection(format!("A store instance named {} does not exist", name))
                })
            }
        }
    }

    pub fn contains(&self, name: Option<&str>) -> Result<bool> {
        match name {
            None => Ok(self.default.read()?.is_some()),
            Some(name) => Ok(self.named.read()?.contains_key(name.trim())),
        }
    }

    /// Unregisters a disconnected instance.
    pub fn remove(&self, name: Option<&str>) -> Result<()> {
        match name {
            None => {
                let mut default = self.default.write()?;
                let instance = default.as_ref().ok_or_else(|| {
                    OdmError::Connection("The default store instance has already been removed".to_string())
                })?;
                if instance.is_connected()? {
                    return Err(OdmError::Connection(
                        "The default store instance is still connected".to_string(),
                    ));
                }
                *default = None;
            }
            Some(name) => {
                let name = check_name(name)?;
                let mut named = self.named.write()?;
                let instance = named.get(name).ok_or_else(|| {
                    OdmError::Connection(format!(
                        "The store instance named {} has already been removed",
                        name
                    ))
                })?;
                if instance.is_connected()? {
                    return Err(OdmError::Connection(format!(
                        "The store instance named {} is still connected",
                        name
                    )));
                }
                named.remove(name);
            }
        }
        Ok(())
    }
}
