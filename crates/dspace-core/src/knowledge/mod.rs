//! Question/answer knowledge base and the tiered matcher that searches it.
//!
//! | Tier | Strategy                                              |
//! |------|-------------------------------------------------------|
//! | 1    | Exact raw key                                         |
//! | 2    | Exact match after normalization                       |
//! | 3    | Normalized substring containment (either direction)   |
//! | 4    | Shared-word score, multi-word questions only          |

mod base;
mod matcher;

pub use base::{KnowledgeBase, KnowledgeEntry};
pub use matcher::{
    Containment, ExactNormalized, ExactRaw, KnowledgeMatcher, Match, MatchTier, Query, Tier,
    WordOverlap,
};

/// Seed knowledge used when storage has nothing yet.
pub fn default_knowledge() -> KnowledgeBase {
    [
        (
            "привет",
            "👋 Привет! Рад вас видеть в D-Space! \nГотов помочь с выбором услуг",
        ),
        ("пока", "👋 До свидания! Приходите еще!"),
        ("спасибо", "Пожалуйста! Рад был помочь! 😊"),
    ]
    .into_iter()
    .collect()
}
