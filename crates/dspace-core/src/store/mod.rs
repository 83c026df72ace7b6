//! Persistence for the catalog collections.
//!
//! Every `load_*` returns `Ok(None)` when the collection was never saved, so the caller can seed
//! defaults. Saves replace the whole collection.

mod json;
mod sled_store;

pub use json::JsonFileStore;
pub use sled_store::SledStore;

use crate::config::{CoreConfig, StorageBackend};
use crate::error::StoreError;
use crate::knowledge::KnowledgeBase;
use crate::topics::{MenuCategories, MenuItem, SuggestionTopics};
use std::sync::Arc;

pub trait CatalogStore: Send + Sync {
    fn load_knowledge(&self) -> Result<Option<KnowledgeBase>, StoreError>;
    fn save_knowledge(&self, base: &KnowledgeBase) -> Result<(), StoreError>;

    fn load_menu(&self) -> Result<Option<Vec<MenuItem>>, StoreError>;
    fn save_menu(&self, menu: &[MenuItem]) -> Result<(), StoreError>;

    fn load_topics(&self) -> Result<Option<SuggestionTopics>, StoreError>;
    fn save_topics(&self, topics: &SuggestionTopics) -> Result<(), StoreError>;

    fn load_categories(&self) -> Result<Option<MenuCategories>, StoreError>;
    fn save_categories(&self, categories: &MenuCategories) -> Result<(), StoreError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Opens the backend selected in config under `data_dir`.
pub fn open_store(cfg: &CoreConfig) -> Result<Arc<dyn CatalogStore>, StoreError> {
    let dir = cfg.data_path();
    let store: Arc<dyn CatalogStore> = match cfg.storage_backend {
        StorageBackend::Json => Arc::new(JsonFileStore::open(&dir)?),
        StorageBackend::Sled => Arc::new(SledStore::open_path(dir.join("dspace_catalog"))?),
    };
    tracing::info!(target: "dspace::store", backend = store.name(), dir = %dir.display(), "catalog store opened");
    Ok(store)
}
