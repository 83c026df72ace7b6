//! Sled-backed catalog with one tree per collection.
//!
//! | Tree         | Key                   | Value                    |
//! |--------------|-----------------------|--------------------------|
//! | `knowledge`  | position (u32, BE)    | JSON `KnowledgeEntry`    |
//! | `menu`       | position (u32, BE)    | JSON `MenuItem`          |
//! | `topics`     | topic name            | JSON `[Suggestion]`      |
//! | `categories` | category key          | display name             |
//! | `meta`       | collection tree name  | empty marker, set on save |
//!
//! Knowledge and menu keep insertion order through their position keys.

use super::CatalogStore;
use crate::error::StoreError;
use crate::knowledge::{KnowledgeBase, KnowledgeEntry};
use crate::topics::{MenuCategories, MenuItem, Suggestion, SuggestionTopics};
use sled::{Batch, Db, Tree};
use std::path::Path;

const KNOWLEDGE_TREE: &str = "knowledge";
const MENU_TREE: &str = "menu";
const TOPICS_TREE: &str = "topics";
const CATEGORIES_TREE: &str = "categories";
const META_TREE: &str = "meta";

pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Opens or creates the catalog DB at the given path.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    fn saved(&self, tree: &str) -> Result<bool, StoreError> {
        Ok(self.db.open_tree(META_TREE)?.contains_key(tree.as_bytes())?)
    }

    /// Atomically replaces the tree contents with `entries`.
    fn replace<I>(&self, name: &str, entries: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
    {
        let tree = self.db.open_tree(name)?;
        let mut batch = Batch::default();
        for key in tree.iter().keys() {
            batch.remove(key?);
        }
        let mut count = 0;
        for (k, v) in entries {
            batch.insert(k, v);
            count += 1;
        }
        tree.apply_batch(batch)?;
        self.db.open_tree(META_TREE)?.insert(name.as_bytes(), Vec::<u8>::new())?;
        self.db.flush()?;
        tracing::info!(target: "dspace::store", tree = name, entries = count, "tree replaced");
        Ok(count)
    }

    fn scan(&self, name: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let tree: Tree = self.db.open_tree(name)?;
        let mut out = Vec::new();
        for item in tree.iter() {
            let (k, v) = item?;
            let key = String::from_utf8_lossy(&k).into_owned();
            out.push((key, v.to_vec()));
        }
        Ok(out)
    }

    fn decode<T: serde::de::DeserializeOwned>(name: &str, key: &str, bytes: &[u8]) -> Result<T, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::json(format!("{name}/{key}"), e))
    }

    fn encode<T: serde::Serialize + ?Sized>(name: &str, value: &T) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(value).map_err(|e| StoreError::json(name, e))
    }
}

impl CatalogStore for SledStore {
    fn load_knowledge(&self) -> Result<Option<KnowledgeBase>, StoreError> {
        if !self.saved(KNOWLEDGE_TREE)? {
            return Ok(None);
        }
        let mut base = KnowledgeBase::new();
        for (pos, (_, v)) in self.scan(KNOWLEDGE_TREE)?.into_iter().enumerate() {
            let entry: KnowledgeEntry = Self::decode(KNOWLEDGE_TREE, &pos.to_string(), &v)?;
            base.insert(entry.question, entry.answer);
        }
        Ok(Some(base))
    }

    fn save_knowledge(&self, base: &KnowledgeBase) -> Result<(), StoreError> {
        let mut entries = Vec::with_capacity(base.len());
        for (i, entry) in base.entries().iter().enumerate() {
            entries.push(((i as u32).to_be_bytes().to_vec(), Self::encode(KNOWLEDGE_TREE, entry)?));
        }
        self.replace(KNOWLEDGE_TREE, entries)?;
        Ok(())
    }

    fn load_menu(&self) -> Result<Option<Vec<MenuItem>>, StoreError> {
        if !self.saved(MENU_TREE)? {
            return Ok(None);
        }
        self.scan(MENU_TREE)?
            .iter()
            .map(|(k, v)| Self::decode(MENU_TREE, k, v))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    fn save_menu(&self, menu: &[MenuItem]) -> Result<(), StoreError> {
        let mut entries = Vec::with_capacity(menu.len());
        for (i, item) in menu.iter().enumerate() {
            entries.push(((i as u32).to_be_bytes().to_vec(), Self::encode(MENU_TREE, item)?));
        }
        self.replace(MENU_TREE, entries)?;
        Ok(())
    }

    fn load_topics(&self) -> Result<Option<SuggestionTopics>, StoreError> {
        if !self.saved(TOPICS_TREE)? {
            return Ok(None);
        }
        self.scan(TOPICS_TREE)?
            .into_iter()
            .map(|(k, v)| Self::decode::<Vec<Suggestion>>(TOPICS_TREE, &k, &v).map(|list| (k, list)))
            .collect::<Result<SuggestionTopics, _>>()
            .map(Some)
    }

    fn save_topics(&self, topics: &SuggestionTopics) -> Result<(), StoreError> {
        let mut entries = Vec::new();
        for (name, list) in topics.iter() {
            entries.push((name.as_bytes().to_vec(), Self::encode(TOPICS_TREE, list)?));
        }
        self.replace(TOPICS_TREE, entries)?;
        Ok(())
    }

    fn load_categories(&self) -> Result<Option<MenuCategories>, StoreError> {
        if !self.saved(CATEGORIES_TREE)? {
            return Ok(None);
        }
        let categories = self
            .scan(CATEGORIES_TREE)?
            .into_iter()
            .map(|(k, v)| (k, String::from_utf8_lossy(&v).into_owned()))
            .collect();
        Ok(Some(categories))
    }

    fn save_categories(&self, categories: &MenuCategories) -> Result<(), StoreError> {
        let entries = categories
            .iter()
            .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()));
        self.replace(CATEGORIES_TREE, entries)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics::{default_categories, default_menu, default_topics};

    #[test]
    fn test_unsaved_collections_are_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open_path(dir.path().join("db")).unwrap();
        assert!(store.load_knowledge().unwrap().is_none());
        assert!(store.load_menu().unwrap().is_none());
    }

    #[test]
    fn test_empty_knowledge_survives_as_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open_path(dir.path().join("db")).unwrap();
        store.save_knowledge(&KnowledgeBase::new()).unwrap();
        assert_eq!(store.load_knowledge().unwrap(), Some(KnowledgeBase::new()));
    }

    #[test]
    fn test_save_replaces_whole_tree() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open_path(dir.path().join("db")).unwrap();
        let first: KnowledgeBase = [("a", "1"), ("b", "2")].into_iter().collect();
        store.save_knowledge(&first).unwrap();
        let second: KnowledgeBase = [("c", "3")].into_iter().collect();
        store.save_knowledge(&second).unwrap();
        assert_eq!(store.load_knowledge().unwrap(), Some(second));
    }

    #[test]
    fn test_knowledge_keeps_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open_path(dir.path().join("db")).unwrap();
        let base: KnowledgeBase = [("я", "1"), ("а", "2"), ("м", "3"), ("b", "4")].into_iter().collect();
        store.save_knowledge(&base).unwrap();
        let loaded = store.load_knowledge().unwrap().unwrap();
        let keys: Vec<&str> = loaded.iter().map(|(q, _)| q).collect();
        assert_eq!(keys, vec!["я", "а", "м", "b"]);
        assert_eq!(loaded, base);
    }

    #[test]
    fn test_menu_keeps_position_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open_path(dir.path().join("db")).unwrap();
        store.save_menu(&default_menu()).unwrap();
        store.save_topics(&default_topics()).unwrap();
        store.save_categories(&default_categories()).unwrap();
        assert_eq!(store.load_menu().unwrap().unwrap(), default_menu());
        assert_eq!(store.load_topics().unwrap().unwrap(), default_topics());
        assert_eq!(store.load_categories().unwrap().unwrap(), default_categories());
    }
}
