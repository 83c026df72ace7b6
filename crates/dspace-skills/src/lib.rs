//! Answer generators used when the local catalog has no answer.

pub use dspace_core::{AnswerGenerator, GenerateError, HistoryTurn};

mod model_router;

pub use model_router::{LiveSettings, LlmMode, ModelRouter};
