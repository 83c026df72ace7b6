//! One pretty-printed JSON document per collection in the data directory.

use super::CatalogStore;
use crate::error::StoreError;
use crate::knowledge::KnowledgeBase;
use crate::topics::{MenuCategories, MenuItem, SuggestionTopics};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const KNOWLEDGE_FILE: &str = "knowledge_base.json";
pub const MENU_FILE: &str = "menu.json";
pub const TOPICS_FILE: &str = "suggestions.json";
pub const CATEGORIES_FILE: &str = "menu_categories.json";

pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Creates the directory if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>, StoreError> {
        let path = self.dir.join(file);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::json(&path, e))
    }

    /// Writes to a sibling temp file, then renames over the target.
    fn write<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<(), StoreError> {
        let path = self.dir.join(file);
        let tmp = self.dir.join(format!("{file}.tmp"));
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::json(&path, e))?;
        std::fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;
        tracing::debug!(target: "dspace::store", file = file, "collection written");
        Ok(())
    }
}

impl CatalogStore for JsonFileStore {
    fn load_knowledge(&self) -> Result<Option<KnowledgeBase>, StoreError> {
        self.read(KNOWLEDGE_FILE)
    }

    fn save_knowledge(&self, base: &KnowledgeBase) -> Result<(), StoreError> {
        self.write(KNOWLEDGE_FILE, base)
    }

    fn load_menu(&self) -> Result<Option<Vec<MenuItem>>, StoreError> {
        self.read(MENU_FILE)
    }

    fn save_menu(&self, menu: &[MenuItem]) -> Result<(), StoreError> {
        self.write(MENU_FILE, menu)
    }

    fn load_topics(&self) -> Result<Option<SuggestionTopics>, StoreError> {
        self.read(TOPICS_FILE)
    }

    fn save_topics(&self, topics: &SuggestionTopics) -> Result<(), StoreError> {
        self.write(TOPICS_FILE, topics)
    }

    fn load_categories(&self) -> Result<Option<MenuCategories>, StoreError> {
        self.read(CATEGORIES_FILE)
    }

    fn save_categories(&self, categories: &MenuCategories) -> Result<(), StoreError> {
        self.write(CATEGORIES_FILE, categories)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}
