//! In-memory catalog (knowledge, menu, topics, categories) with persisted admin mutations.
//!
//! Readers take an `Arc<CatalogSnapshot>` and keep it for the whole request. Writers are
//! serialized, edit a copy, swap it in, then save the touched collection. A failed save leaves
//! the new snapshot in place and is reported as [`CatalogError::Store`].

use crate::error::{CatalogError, StoreError};
use crate::knowledge::{default_knowledge, KnowledgeBase, KnowledgeEntry};
use crate::store::CatalogStore;
use crate::topics::{
    default_categories, default_menu, default_topics, is_system_category, MenuCategories,
    MenuItem, Suggestion, SuggestionTopics, DEFAULT_TOPIC, SYSTEM_CATEGORIES,
};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Everything the router needs to answer one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogSnapshot {
    pub knowledge: KnowledgeBase,
    pub menu: Vec<MenuItem>,
    pub topics: SuggestionTopics,
    pub categories: MenuCategories,
}

impl CatalogSnapshot {
    /// Seed data: greetings, six menu buttons, three topics, system categories.
    pub fn seeded() -> Self {
        Self {
            knowledge: default_knowledge(),
            menu: default_menu(),
            topics: default_topics(),
            categories: default_categories(),
        }
    }

    pub fn menu_in_category(&self, category: &str) -> Vec<MenuItem> {
        self.menu
            .iter()
            .filter(|item| item.category == category)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collection {
    Knowledge,
    Menu,
    Topics,
    Categories,
}

/// Result of a bulk knowledge import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub success_count: usize,
    pub error_count: usize,
}

pub struct Catalog {
    store: Arc<dyn CatalogStore>,
    current: RwLock<Arc<CatalogSnapshot>>,
    writer: Mutex<()>,
}

impl Catalog {
    /// Loads every collection, seeding (and saving) defaults for the ones never stored.
    /// Unreadable collections fall back to defaults without overwriting storage.
    pub fn open(store: Arc<dyn CatalogStore>) -> Self {
        let snapshot = load_all(store.as_ref(), &CatalogSnapshot::seeded());
        tracing::info!(
            target: "dspace::catalog",
            backend = store.name(),
            knowledge = snapshot.knowledge.len(),
            menu = snapshot.menu.len(),
            "catalog loaded"
        );
        Self::with_snapshot(store, snapshot)
    }

    /// Starts from a given snapshot without reading storage.
    pub fn with_snapshot(store: Arc<dyn CatalogStore>, snapshot: CatalogSnapshot) -> Self {
        Self {
            store,
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-reads storage. Collections that fail to load keep their current value.
    pub fn reload(&self) -> Arc<CatalogSnapshot> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = self.snapshot();
        let fresh = Arc::new(load_all(self.store.as_ref(), &previous));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = fresh.clone();
        tracing::info!(target: "dspace::catalog", knowledge = fresh.knowledge.len(), "catalog reloaded");
        fresh
    }

    fn mutate<T>(
        &self,
        collection: Collection,
        f: impl FnOnce(&mut CatalogSnapshot) -> Result<T, CatalogError>,
    ) -> Result<T, CatalogError> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = CatalogSnapshot::clone(&self.snapshot());
        let out = f(&mut next)?;
        if collection == Collection::Topics {
            next.topics.ensure_default();
        }
        let next = Arc::new(next);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        self.persist(collection, &next).map_err(|e| {
            tracing::error!(target: "dspace::catalog", ?collection, error = %e, "catalog save failed");
            CatalogError::Store(e)
        })?;
        Ok(out)
    }

    fn persist(&self, collection: Collection, snap: &CatalogSnapshot) -> Result<(), StoreError> {
        match collection {
            Collection::Knowledge => self.store.save_knowledge(&snap.knowledge),
            Collection::Menu => self.store.save_menu(&snap.menu),
            Collection::Topics => self.store.save_topics(&snap.topics),
            Collection::Categories => self.store.save_categories(&snap.categories),
        }
    }

    // ---- knowledge ----

    /// Case-insensitive substring search over stored questions.
    pub fn search_knowledge(&self, query: &str) -> Vec<KnowledgeEntry> {
        let needle = query.trim().to_lowercase();
        self.snapshot()
            .knowledge
            .entries()
            .iter()
            .filter(|e| e.question.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Adds or replaces; the key is stored trimmed and lower-cased. Returns the replaced answer.
    pub fn add_knowledge(&self, question: &str, answer: &str) -> Result<Option<String>, CatalogError> {
        let (question, answer) = knowledge_pair(question, answer)?;
        let prev = self.mutate(Collection::Knowledge, |snap| {
            Ok(snap.knowledge.insert(question.clone(), answer))
        })?;
        tracing::info!(target: "dspace::catalog", question = %question, replaced = prev.is_some(), "knowledge added");
        Ok(prev)
    }

    /// Replaces `old_question` with `new_question` (rename allowed).
    pub fn update_knowledge(
        &self,
        old_question: &str,
        new_question: &str,
        answer: &str,
    ) -> Result<(), CatalogError> {
        let (question, answer) = knowledge_pair(new_question, answer)?;
        self.mutate(Collection::Knowledge, |snap| {
            let old = existing_key(&snap.knowledge, old_question)
                .ok_or_else(|| CatalogError::NotFound(old_question.trim().to_string()))?;
            if old != question {
                snap.knowledge.remove(&old);
            }
            snap.knowledge.insert(question.clone(), answer);
            Ok(())
        })?;
        tracing::info!(target: "dspace::catalog", old = %old_question.trim(), new = %question, "knowledge updated");
        Ok(())
    }

    /// Removes a question. Returns its answer.
    pub fn delete_knowledge(&self, question: &str) -> Result<String, CatalogError> {
        let answer = self.mutate(Collection::Knowledge, |snap| {
            let key = existing_key(&snap.knowledge, question)
                .ok_or_else(|| CatalogError::NotFound(question.trim().to_string()))?;
            snap.knowledge
                .remove(&key)
                .ok_or_else(|| CatalogError::NotFound(key.clone()))
        })?;
        tracing::info!(target: "dspace::catalog", question = %question.trim(), "knowledge deleted");
        Ok(answer)
    }

    /// Bulk upsert. Pairs with an empty side are counted as errors and skipped.
    pub fn import_knowledge<I>(&self, pairs: I) -> Result<ImportReport, CatalogError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let report = self.mutate(Collection::Knowledge, |snap| {
            let mut report = ImportReport::default();
            for (q, a) in pairs {
                match knowledge_pair(&q, &a) {
                    Ok((q, a)) => {
                        snap.knowledge.insert(q, a);
                        report.success_count += 1;
                    }
                    Err(_) => report.error_count += 1,
                }
            }
            Ok(report)
        })?;
        tracing::info!(
            target: "dspace::catalog",
            success = report.success_count,
            errors = report.error_count,
            "knowledge imported"
        );
        Ok(report)
    }

    // ---- menu ----

    pub fn add_menu_item(&self, item: MenuItem) -> Result<(), CatalogError> {
        let item = clean_menu_item(item)?;
        let label = item.admin_text.clone();
        self.mutate(Collection::Menu, |snap| {
            check_menu_duplicates(&snap.menu, &item, None)?;
            snap.menu.push(item);
            Ok(())
        })?;
        tracing::info!(target: "dspace::catalog", button = %label, "menu button added");
        Ok(())
    }

    pub fn update_menu_item(&self, index: usize, item: MenuItem) -> Result<(), CatalogError> {
        let item = clean_menu_item(item)?;
        self.mutate(Collection::Menu, |snap| {
            if index >= snap.menu.len() {
                return Err(CatalogError::NotFound("Неверный индекс кнопки".into()));
            }
            check_menu_duplicates(&snap.menu, &item, Some(index))?;
            snap.menu[index] = item;
            Ok(())
        })?;
        tracing::info!(target: "dspace::catalog", index, "menu button updated");
        Ok(())
    }

    pub fn delete_menu_item(&self, index: usize) -> Result<MenuItem, CatalogError> {
        let removed = self.mutate(Collection::Menu, |snap| {
            if index >= snap.menu.len() {
                return Err(CatalogError::NotFound("Неверный индекс кнопки".into()));
            }
            Ok(snap.menu.remove(index))
        })?;
        tracing::info!(target: "dspace::catalog", button = %removed.admin_text, "menu button deleted");
        Ok(removed)
    }

    // ---- categories ----

    /// Adds a custom category. Keys are `[a-z0-9_]+` after lower-casing.
    pub fn add_category(&self, key: &str, name: &str) -> Result<(), CatalogError> {
        let key = key.trim().to_lowercase();
        let name = name.trim().to_string();
        if key.is_empty() || name.is_empty() {
            return Err(CatalogError::Validation("Оба поля обязательны для заполнения".into()));
        }
        if !key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            return Err(CatalogError::Validation(
                "Ключ категории может содержать только латинские буквы в нижнем регистре, цифры и подчеркивание".into(),
            ));
        }
        self.mutate(Collection::Categories, |snap| {
            if snap.categories.contains_key(&key) {
                return Err(CatalogError::Conflict("Категория с таким ключом уже существует".into()));
            }
            snap.categories.insert(key.clone(), name);
            Ok(())
        })?;
        tracing::info!(target: "dspace::catalog", category = %key, "menu category added");
        Ok(())
    }

    /// Removes a custom category that no menu button uses.
    pub fn delete_category(&self, key: &str) -> Result<String, CatalogError> {
        if is_system_category(key) {
            return Err(CatalogError::Conflict("Нельзя удалить системную категорию".into()));
        }
        let name = self.mutate(Collection::Categories, |snap| {
            if !snap.categories.contains_key(key) {
                return Err(CatalogError::NotFound("Категория не найдена".into()));
            }
            if snap.menu.iter().any(|item| item.category == key) {
                return Err(CatalogError::Conflict(
                    "Нельзя удалить категорию, к которой привязаны кнопки меню".into(),
                ));
            }
            snap.categories
                .remove(key)
                .ok_or_else(|| CatalogError::NotFound("Категория не найдена".into()))
        })?;
        tracing::info!(target: "dspace::catalog", category = key, "menu category deleted");
        Ok(name)
    }

    // ---- suggestions ----

    pub fn add_suggestion(&self, topic: &str, suggestion: Suggestion) -> Result<(), CatalogError> {
        let (topic, suggestion) = clean_suggestion(topic, suggestion)?;
        self.mutate(Collection::Topics, |snap| {
            let list = snap.topics.topic_mut(&topic);
            if list.iter().any(|s| s.label == suggestion.label) {
                return Err(CatalogError::Conflict("Подсказка с таким названием уже существует".into()));
            }
            list.push(suggestion);
            Ok(())
        })?;
        tracing::info!(target: "dspace::catalog", topic = %topic, "suggestion added");
        Ok(())
    }

    /// Rewrites the suggestion `label` in `topic`; a different `new_topic` moves it to the end of
    /// that topic.
    pub fn update_suggestion(
        &self,
        topic: &str,
        label: &str,
        new_topic: &str,
        suggestion: Suggestion,
    ) -> Result<(), CatalogError> {
        let (new_topic, suggestion) = clean_suggestion(new_topic, suggestion)?;
        self.mutate(Collection::Topics, |snap| {
            let list = snap
                .topics
                .get_mut(topic)
                .ok_or_else(|| CatalogError::NotFound("Подсказка не найдена".into()))?;
            let pos = list
                .iter()
                .position(|s| s.label == label)
                .ok_or_else(|| CatalogError::NotFound("Подсказка не найдена".into()))?;
            if new_topic == topic {
                if list
                    .iter()
                    .enumerate()
                    .any(|(i, s)| i != pos && s.label == suggestion.label)
                {
                    return Err(CatalogError::Conflict("Подсказка с таким названием уже существует".into()));
                }
                list[pos] = suggestion;
            } else {
                if snap
                    .topics
                    .get(&new_topic)
                    .is_some_and(|l| l.iter().any(|s| s.label == suggestion.label))
                {
                    return Err(CatalogError::Conflict("Подсказка с таким названием уже существует".into()));
                }
                if let Some(list) = snap.topics.get_mut(topic) {
                    list.remove(pos);
                }
                snap.topics.topic_mut(&new_topic).push(suggestion);
            }
            Ok(())
        })?;
        tracing::info!(target: "dspace::catalog", from = topic, to = %new_topic, label, "suggestion updated");
        Ok(())
    }

    pub fn delete_suggestion(&self, topic: &str, label: &str) -> Result<Suggestion, CatalogError> {
        let removed = self.mutate(Collection::Topics, |snap| {
            let list = snap
                .topics
                .get_mut(topic)
                .ok_or_else(|| CatalogError::NotFound("Подсказка не найдена".into()))?;
            let pos = list
                .iter()
                .position(|s| s.label == label)
                .ok_or_else(|| CatalogError::NotFound("Подсказка не найдена".into()))?;
            Ok(list.remove(pos))
        })?;
        tracing::info!(target: "dspace::catalog", topic, label, "suggestion deleted");
        Ok(removed)
    }
}

fn load_all(store: &dyn CatalogStore, fallback: &CatalogSnapshot) -> CatalogSnapshot {
    let knowledge = load_or_seed(
        "knowledge",
        store.load_knowledge(),
        || default_knowledge(),
        || fallback.knowledge.clone(),
        |v| store.save_knowledge(v),
    );
    let menu = load_or_seed(
        "menu",
        store.load_menu(),
        default_menu,
        || fallback.menu.clone(),
        |v| store.save_menu(v),
    );
    let mut topics = load_or_seed(
        "topics",
        store.load_topics(),
        default_topics,
        || fallback.topics.clone(),
        |v| store.save_topics(v),
    );
    if topics.ensure_default() {
        tracing::warn!(target: "dspace::catalog", topic = DEFAULT_TOPIC, "default topic was empty, re-seeded");
        save_logged("topics", store.save_topics(&topics));
    }
    let mut categories = load_or_seed(
        "categories",
        store.load_categories(),
        default_categories,
        || fallback.categories.clone(),
        |v| store.save_categories(v),
    );
    let mut added_system = false;
    for (key, name) in SYSTEM_CATEGORIES {
        if !categories.contains_key(key) {
            categories.insert(key.to_string(), name.to_string());
            added_system = true;
        }
    }
    if added_system {
        save_logged("categories", store.save_categories(&categories));
    }
    CatalogSnapshot {
        knowledge,
        menu,
        topics,
        categories,
    }
}

fn load_or_seed<T>(
    what: &'static str,
    loaded: Result<Option<T>, StoreError>,
    seed: impl FnOnce() -> T,
    on_error: impl FnOnce() -> T,
    save: impl FnOnce(&T) -> Result<(), StoreError>,
) -> T {
    match loaded {
        Ok(Some(v)) => v,
        Ok(None) => {
            let v = seed();
            tracing::info!(target: "dspace::catalog", collection = what, "nothing stored yet, seeding defaults");
            save_logged(what, save(&v));
            v
        }
        Err(e) => {
            tracing::error!(target: "dspace::catalog", collection = what, error = %e, "load failed, keeping fallback");
            on_error()
        }
    }
}

fn save_logged(what: &'static str, result: Result<(), StoreError>) {
    if let Err(e) = result {
        tracing::error!(target: "dspace::catalog", collection = what, error = %e, "seed save failed");
    }
}

fn knowledge_pair(question: &str, answer: &str) -> Result<(String, String), CatalogError> {
    let question = question.trim().to_lowercase();
    let answer = answer.trim().to_string();
    if question.is_empty() || answer.is_empty() {
        return Err(CatalogError::Validation("Все поля обязательны".into()));
    }
    Ok((question, answer))
}

/// The stored key for an admin-supplied question: as given, else trimmed and lower-cased.
fn existing_key(base: &KnowledgeBase, question: &str) -> Option<String> {
    if base.contains(question) {
        return Some(question.to_string());
    }
    let cleaned = question.trim().to_lowercase();
    base.contains(&cleaned).then_some(cleaned)
}

fn clean_menu_item(mut item: MenuItem) -> Result<MenuItem, CatalogError> {
    item.admin_text = item.admin_text.trim().to_string();
    item.display_text = item.display_text.trim().to_string();
    item.question = item.question.trim().to_lowercase();
    item.category = item.category.trim().to_string();
    if item.category.is_empty() {
        item.category = "attractions".to_string();
    }
    item.suggestion_topic = item.suggestion_topic.trim().to_lowercase();
    if item.suggestion_topic.is_empty() {
        item.suggestion_topic = DEFAULT_TOPIC.to_string();
    }
    if item.admin_text.is_empty() || item.display_text.is_empty() || item.question.is_empty() {
        return Err(CatalogError::Validation("Все поля обязательны".into()));
    }
    Ok(item)
}

fn check_menu_duplicates(menu: &[MenuItem], item: &MenuItem, skip: Option<usize>) -> Result<(), CatalogError> {
    for (i, other) in menu.iter().enumerate() {
        if Some(i) == skip {
            continue;
        }
        if other.admin_text == item.admin_text {
            return Err(CatalogError::Conflict(
                "Кнопка с таким текстом для админки уже существует".into(),
            ));
        }
        if other.question == item.question {
            return Err(CatalogError::Conflict("Кнопка с таким вопросом уже существует".into()));
        }
    }
    Ok(())
}

fn clean_suggestion(topic: &str, s: Suggestion) -> Result<(String, Suggestion), CatalogError> {
    let topic = topic.trim().to_lowercase();
    let s = Suggestion::new(s.label.trim(), s.question.trim().to_lowercase(), s.answer.trim());
    if topic.is_empty() || s.label.is_empty() || s.question.is_empty() || s.answer.is_empty() {
        return Err(CatalogError::Validation("Все поля обязательны".into()));
    }
    Ok((topic, s))
}
