//! dspace-core: assistant core library (normalization, knowledge matching, topics, routing,
//! catalog storage, interaction log).
//!
//! The gateway and the generator crate depend only on this public API.

mod bookings;
mod catalog;
mod config;
mod error;
mod interaction;
mod jsonl;
mod router;
mod store;

pub mod knowledge;
pub mod text;
pub mod topics;

pub use config::{CoreConfig, StorageBackend, DEFAULT_LLM_API_URL};
pub use error::{CatalogError, GenerateError, StoreError};

pub use knowledge::{default_knowledge, KnowledgeBase, KnowledgeEntry, KnowledgeMatcher, Match, Tier};
pub use text::normalize;
pub use topics::{
    answer_for, answer_in_any_topic, resolve_topic, suggestions_for, MenuCategories, MenuItem,
    Suggestion, SuggestionButton, SuggestionTopics, DEFAULT_TOPIC, SYSTEM_CATEGORIES,
};

pub use catalog::{Catalog, CatalogSnapshot, ImportReport};
pub use store::{open_store, CatalogStore, JsonFileStore, SledStore};

pub use interaction::{InteractionLog, InteractionRecord, InteractionSink, NullSink};
pub use jsonl::now_ms;

pub use bookings::{Booking, BookingBook, BookingError, BookingRequest, Feedback, FeedbackBox};

pub use router::{
    AnswerGenerator, AnswerSource, Channel, ConversationRouter, HistoryTurn, Reply, Role,
    GENERATOR_APOLOGY,
};
