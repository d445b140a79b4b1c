#![allow(dead_code)]

use docmapper::{Entity, MemoryBlobStore, MemoryConnector, MemoryDocumentStore, Registry, StoreConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const BUCKET: &str = "media";

/// Autokey entity with one file field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Entity)]
pub struct Item {
    #[odm(autokey)]
    pub id: Option<String>,
    #[odm(file)]
    pub photo: Option<String>,
    pub name: String,
}

impl Item {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Explicit-key entity with plain string file fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Entity)]
pub struct Product {
    #[odm(key)]
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub active: bool,
    #[odm(file)]
    #[serde(default)]
    pub manual: String,
    #[odm(file)]
    #[serde(default)]
    pub cover: String,
}

impl Product {
    pub fn new(code: &str, name: &str, price: i64) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            price,
            ..Self::default()
        }
    }

    pub fn tagged(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|tag| tag.to_string()).collect();
        self
    }
}

pub struct Fixture {
    pub registry: Arc<Registry>,
    pub connector: Arc<MemoryConnector>,
}

impl Fixture {
    /// Registry with a connected default instance backed by memory stores.
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());
        let connector = Arc::new(MemoryConnector::new());
        registry
            .stores()
            .create(StoreConfig::new(BUCKET), connector.clone())
            .unwrap()
            .connect()
            .unwrap();
        Self { registry, connector }
    }

    pub fn documents(&self) -> Arc<MemoryDocumentStore> {
        self.connector.documents()
    }

    pub fn blobs(&self) -> Arc<MemoryBlobStore> {
        self.connector.blobs(BUCKET).unwrap()
    }
}
