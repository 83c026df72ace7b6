//! Tiered knowledge lookup: an ordered chain of [`MatchTier`]s, first hit wins.

use super::KnowledgeBase;
use crate::text::{normalize, word_set};
use serde::Serialize;

/// Which tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    ExactRaw,
    ExactNormalized,
    Containment,
    WordOverlap,
}

/// A question prepared once per lookup and shared by every tier.
#[derive(Debug, Clone)]
pub struct Query<'q> {
    pub raw: &'q str,
    pub normalized: String,
}

impl<'q> Query<'q> {
    pub fn new(raw: &'q str) -> Self {
        Self {
            raw,
            normalized: normalize(raw),
        }
    }
}

/// Successful lookup: the stored answer plus the tier that found it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'b> {
    pub answer: &'b str,
    pub tier: Tier,
}

/// One strategy in the lookup chain. `None` passes the query to the next tier.
pub trait MatchTier: Send + Sync {
    fn tier(&self) -> Tier;

    fn find<'b>(&self, query: &Query<'_>, base: &'b KnowledgeBase) -> Option<&'b str>;
}

/// The question is literally a stored key.
pub struct ExactRaw;

impl MatchTier for ExactRaw {
    fn tier(&self) -> Tier {
        Tier::ExactRaw
    }

    fn find<'b>(&self, query: &Query<'_>, base: &'b KnowledgeBase) -> Option<&'b str> {
        base.get(query.raw)
    }
}

/// First key whose normalized form equals the normalized question.
pub struct ExactNormalized;

impl MatchTier for ExactNormalized {
    fn tier(&self) -> Tier {
        Tier::ExactNormalized
    }

    fn find<'b>(&self, query: &Query<'_>, base: &'b KnowledgeBase) -> Option<&'b str> {
        base.iter()
            .find(|(key, _)| normalize(key) == query.normalized)
            .map(|(_, answer)| answer)
    }
}

/// First key where one normalized side contains the other. Empty strings never match here,
/// otherwise a punctuation-only question would hit the first key of the base.
pub struct Containment;

impl MatchTier for Containment {
    fn tier(&self) -> Tier {
        Tier::Containment
    }

    fn find<'b>(&self, query: &Query<'_>, base: &'b KnowledgeBase) -> Option<&'b str> {
        let question = query.normalized.as_str();
        if question.is_empty() {
            return None;
        }
        base.iter()
            .find(|(key, _)| {
                let key = normalize(key);
                !key.is_empty() && (question.contains(&key) || key.contains(question))
            })
            .map(|(_, answer)| answer)
    }
}

/// Shared-word scoring for multi-word questions.
///
/// A key qualifies when it shares at least `max(1, ceil(n / 2))` distinct words with an
/// `n`-word question. The strictly best score wins; ties keep the earliest key.
pub struct WordOverlap;

impl WordOverlap {
    /// Minimum shared words for a question of `question_words` distinct words.
    pub fn required_score(question_words: usize) -> usize {
        question_words.div_ceil(2).max(1)
    }
}

impl MatchTier for WordOverlap {
    fn tier(&self) -> Tier {
        Tier::WordOverlap
    }

    fn find<'b>(&self, query: &Query<'_>, base: &'b KnowledgeBase) -> Option<&'b str> {
        let question_words = word_set(&query.normalized);
        if question_words.len() <= 1 {
            return None;
        }
        let required = Self::required_score(question_words.len());

        let mut best: Option<(usize, &'b str)> = None;
        for (key, answer) in base.iter() {
            let key = normalize(key);
            let score = word_set(&key).intersection(&question_words).count();
            let best_score = best.map(|(s, _)| s).unwrap_or(0);
            if score > best_score && score >= required {
                best = Some((score, answer));
            }
        }
        best.map(|(_, answer)| answer)
    }
}

/// Runs the tiers in order and stops at the first hit.
pub struct KnowledgeMatcher {
    tiers: Vec<Box<dyn MatchTier>>,
}

impl KnowledgeMatcher {
    /// Standard chain: exact raw, exact normalized, containment, word overlap.
    pub fn new() -> Self {
        Self::with_tiers(vec![
            Box::new(ExactRaw),
            Box::new(ExactNormalized),
            Box::new(Containment),
            Box::new(WordOverlap),
        ])
    }

    pub fn with_tiers(tiers: Vec<Box<dyn MatchTier>>) -> Self {
        Self { tiers }
    }

    pub fn lookup<'b>(&self, raw_question: &str, base: &'b KnowledgeBase) -> Option<Match<'b>> {
        let query = Query::new(raw_question);
        let hit = self.tiers.iter().find_map(|tier| {
            tier.find(&query, base).map(|answer| Match {
                answer,
                tier: tier.tier(),
            })
        });
        match &hit {
            Some(m) => tracing::debug!(target: "dspace::matcher", tier = ?m.tier, "knowledge hit"),
            None => tracing::debug!(target: "dspace::matcher", entries = base.len(), "knowledge miss"),
        }
        hit
    }
}

impl Default for KnowledgeMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(pairs: &[(&str, &str)]) -> KnowledgeBase {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_exact_raw_wins_even_when_normalization_differs() {
        let kb = base(&[("цены", "normalized"), ("Цены?!", "raw")]);
        let hit = KnowledgeMatcher::new().lookup("Цены?!", &kb).unwrap();
        assert_eq!(hit.answer, "raw");
        assert_eq!(hit.tier, Tier::ExactRaw);
    }

    #[test]
    fn test_normalized_match_is_case_insensitive() {
        let kb = base(&[("привет", "Привет!")]);
        let hit = KnowledgeMatcher::new().lookup("ПРИВЕТ", &kb).unwrap();
        assert_eq!(hit.answer, "Привет!");
        assert_eq!(hit.tier, Tier::ExactNormalized);
    }

    #[test]
    fn test_normalized_match_first_in_base_order() {
        let kb = base(&[("Часы работы", "first"), ("часы работы!", "second")]);
        let hit = KnowledgeMatcher::new().lookup("ЧАСЫ РАБОТЫ", &kb).unwrap();
        assert_eq!(hit.answer, "first");
    }

    #[test]
    fn test_containment_key_inside_question() {
        let kb = base(&[("vr игры", "ans1")]);
        let hit = KnowledgeMatcher::new()
            .lookup("хочу vr игры сегодня", &kb)
            .unwrap();
        assert_eq!(hit.answer, "ans1");
        assert_eq!(hit.tier, Tier::Containment);
    }

    #[test]
    fn test_containment_question_inside_key() {
        let kb = base(&[("стоимость батутов для детей", "ans")]);
        let hit = KnowledgeMatcher::new().lookup("батутов", &kb).unwrap();
        assert_eq!(hit.tier, Tier::Containment);
    }

    #[test]
    fn test_punctuation_only_question_does_not_match_everything() {
        let kb = base(&[("привет", "Привет!")]);
        assert!(KnowledgeMatcher::new().lookup("?!", &kb).is_none());
    }

    #[test]
    fn test_punctuation_only_key_is_skipped_by_containment() {
        let kb = base(&[("???", "junk"), ("привет", "Привет!")]);
        let hit = KnowledgeMatcher::new().lookup("ну привет", &kb).unwrap();
        assert_eq!(hit.answer, "Привет!");
        assert_eq!(hit.tier, Tier::Containment);
    }

    #[test]
    fn test_word_overlap_below_threshold_does_not_qualify() {
        let kb = base(&[("забронировать батуты", "booking")]);
        // 5 distinct words, 2 shared, 2 < ceil(5 / 2) = 3. Containment does not apply either
        // because "на" sits between the shared words and the key is not a substring.
        let q = "можно забронировать на завтра батуты";
        assert!(KnowledgeMatcher::new().lookup(q, &kb).is_none());
        assert!(WordOverlap.find(&Query::new(q), &kb).is_none());
    }

    #[test]
    fn test_word_overlap_boundary_from_contiguous_phrase() {
        // The contiguous phrase is caught by containment, not by word overlap.
        let kb = base(&[("забронировать батуты", "booking")]);
        let q = "можно забронировать батуты на завтра";
        let hit = KnowledgeMatcher::new().lookup(q, &kb).unwrap();
        assert_eq!(hit.tier, Tier::Containment);
        assert!(WordOverlap.find(&Query::new(q), &kb).is_none());
    }

    #[test]
    fn test_word_overlap_qualifies_at_threshold() {
        let kb = base(&[("цена детского праздника", "party")]);
        // 4 words, needs 2: shares "цена" and "праздника".
        let hit = KnowledgeMatcher::new()
            .lookup("какая цена на праздника", &kb)
            .unwrap();
        assert_eq!(hit.answer, "party");
        assert_eq!(hit.tier, Tier::WordOverlap);
    }

    #[test]
    fn test_word_overlap_tie_keeps_first() {
        let kb = base(&[("аренда зала вечером", "first"), ("аренда зала утром", "second")]);
        let hit = KnowledgeMatcher::new()
            .lookup("сколько стоит аренда зала", &kb)
            .unwrap();
        assert_eq!(hit.tier, Tier::WordOverlap);
        assert_eq!(hit.answer, "first");
    }

    #[test]
    fn test_word_overlap_prefers_higher_score() {
        let kb = base(&[("аренда зала", "low"), ("аренда зала для праздника", "high")]);
        let q = "аренда большого зала для праздника";
        let hit = WordOverlap.find(&Query::new(q), &kb);
        assert_eq!(hit, Some("high"));
    }

    #[test]
    fn test_single_word_question_skips_word_overlap() {
        let kb = base(&[("часы работы", "hours")]);
        assert!(WordOverlap.find(&Query::new("работы!"), &kb).is_none());
    }

    #[test]
    fn test_required_score() {
        assert_eq!(WordOverlap::required_score(1), 1);
        assert_eq!(WordOverlap::required_score(2), 1);
        assert_eq!(WordOverlap::required_score(3), 2);
        assert_eq!(WordOverlap::required_score(5), 3);
        assert_eq!(WordOverlap::required_score(6), 3);
    }

    #[test]
    fn test_miss_on_empty_base() {
        assert!(KnowledgeMatcher::new()
            .lookup("что угодно", &KnowledgeBase::new())
            .is_none());
    }
}
