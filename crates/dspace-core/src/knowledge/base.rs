//! Ordered question -> answer collection.
//!
//! Iteration order is load order (new keys are appended), which the matcher relies on for
//! deterministic tie-breaks. Serialized as a plain JSON object, and deserialization keeps the
//! order in which keys appear in the document.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One stored question and its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact (untouched) key lookup.
    pub fn get(&self, question: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.question == question)
            .map(|e| e.answer.as_str())
    }

    pub fn contains(&self, question: &str) -> bool {
        self.get(question).is_some()
    }

    /// Inserts or replaces; a replaced key keeps its position. Returns the previous answer.
    pub fn insert(&mut self, question: impl Into<String>, answer: impl Into<String>) -> Option<String> {
        let question = question.into();
        let answer = answer.into();
        match self.entries.iter_mut().find(|e| e.question == question) {
            Some(entry) => Some(std::mem::replace(&mut entry.answer, answer)),
            None => {
                self.entries.push(KnowledgeEntry { question, answer });
                None
            }
        }
    }

    pub fn remove(&mut self, question: &str) -> Option<String> {
        let pos = self.entries.iter().position(|e| e.question == question)?;
        Some(self.entries.remove(pos).answer)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.question.as_str(), e.answer.as_str()))
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }
}

impl<Q: Into<String>, A: Into<String>> FromIterator<(Q, A)> for KnowledgeBase {
    fn from_iter<I: IntoIterator<Item = (Q, A)>>(iter: I) -> Self {
        let mut base = KnowledgeBase::new();
        for (q, a) in iter {
            base.insert(q, a);
        }
        base
    }
}

impl Serialize for KnowledgeBase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for e in &self.entries {
            map.serialize_entry(&e.question, &e.answer)?;
        }
        map.end()
    }
}

struct KnowledgeBaseVisitor;

impl<'de> Visitor<'de> for KnowledgeBaseVisitor {
    type Value = KnowledgeBase;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of question strings to answer strings")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
        let mut base = KnowledgeBase::new();
        while let Some((q, a)) = access.next_entry::<String, String>()? {
            base.insert(q, a);
        }
        Ok(base)
    }
}

impl<'de> Deserialize<'de> for KnowledgeBase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(KnowledgeBaseVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_keeps_document_order() {
        let base: KnowledgeBase =
            serde_json::from_str(r#"{"я": "1", "а": "2", "м": "3"}"#).unwrap();
        let keys: Vec<&str> = base.iter().map(|(q, _)| q).collect();
        assert_eq!(keys, vec!["я", "а", "м"]);

        let out = serde_json::to_string(&base).unwrap();
        assert_eq!(out, r#"{"я":"1","а":"2","м":"3"}"#);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut base: KnowledgeBase = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(base.insert("a", "10"), Some("1".to_string()));
        base.insert("c", "3");
        let keys: Vec<&str> = base.iter().map(|(q, _)| q).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(base.get("a"), Some("10"));
        assert_eq!(base.remove("b"), Some("2".to_string()));
        assert_eq!(base.len(), 2);
    }
}
