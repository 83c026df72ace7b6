//! Conversation router: decides which answer a visitor sees for one message.
//!
//! ```text
//! raw (trimmed) ── empty ──────────────────────────────► channel prompt, "error", not logged
//!      │
//!      ├─ menu trigger? ── yes ─► topic suggestions ─► suggestion answer ─┐
//!      │                                                                    ├─► knowledge ─► generator
//!      └─ no ──────────────────► default suggestions ─────────────────────┘
//! ```
//!
//! Every non-empty message is reported to the [`InteractionSink`].

use crate::catalog::Catalog;
use crate::error::GenerateError;
use crate::interaction::{InteractionRecord, InteractionSink};
use crate::knowledge::KnowledgeMatcher;
use crate::topics::{answer_for, resolve_topic, suggestion_list, SuggestionButton};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Shown when the generator fails or runs out of time.
pub const GENERATOR_APOLOGY: &str = "❌ Не удалось получить ответ. Попробуйте позже.";

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(35);

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    KnowledgeBase,
    SuggestionMap,
    ExternalGenerator,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Earlier message passed to the generator for context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub text: String,
}

/// Produces an answer when nothing local matches.
#[async_trait::async_trait]
pub trait AnswerGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn answer(&self, question: &str, history: &[HistoryTurn]) -> Result<String, GenerateError>;
}

/// Entry point the message arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Chat,
    /// Speech-to-text input: lower-cased and logged with a `[VOICE] ` prefix.
    Voice,
}

impl Channel {
    pub fn empty_prompt(self) -> &'static str {
        match self {
            Channel::Chat => "Пожалуйста, задайте вопрос.",
            Channel::Voice => "Голосовое сообщение не распознано. Попробуйте еще раз.",
        }
    }

    fn prepare(self, raw: &str) -> String {
        match self {
            Channel::Chat => raw.trim().to_string(),
            Channel::Voice => raw.trim().to_lowercase(),
        }
    }

    fn log_question(self, question: &str) -> String {
        match self {
            Channel::Chat => question.to_string(),
            Channel::Voice => format!("[VOICE] {question}"),
        }
    }
}

/// What the widget receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub answer: String,
    pub source: AnswerSource,
    pub suggestions: Vec<SuggestionButton>,
}

pub struct ConversationRouter {
    catalog: Arc<Catalog>,
    matcher: KnowledgeMatcher,
    generator: Arc<dyn AnswerGenerator>,
    sink: Arc<dyn InteractionSink>,
    deadline: Duration,
}

impl ConversationRouter {
    pub fn new(
        catalog: Arc<Catalog>,
        generator: Arc<dyn AnswerGenerator>,
        sink: Arc<dyn InteractionSink>,
    ) -> Self {
        Self {
            catalog,
            matcher: KnowledgeMatcher::new(),
            generator,
            sink,
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Overall bound on one generator call, retries included.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_matcher(mut self, matcher: KnowledgeMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub async fn route(&self, raw: &str, channel: Channel) -> Reply {
        self.route_with_history(raw, channel, &[]).await
    }

    /// Chat runs the full pipeline: menu topic, suggestion answer, knowledge, generator.
    /// Voice skips topics and answers like [`ask`](Self::ask).
    pub async fn route_with_history(&self, raw: &str, channel: Channel, history: &[HistoryTurn]) -> Reply {
        if channel == Channel::Voice {
            return self.answer_direct(raw, channel).await;
        }
        let question = channel.prepare(raw);
        if question.is_empty() {
            return Reply {
                answer: channel.empty_prompt().to_string(),
                source: AnswerSource::Error,
                suggestions: Vec::new(),
            };
        }

        let snap = self.catalog.snapshot();
        let topic = resolve_topic(&question, &snap.menu);
        let list = suggestion_list(topic, &snap.topics);
        let suggestions: Vec<SuggestionButton> = list.iter().map(|s| s.button()).collect();

        let local = topic
            .and_then(|_| answer_for(&question, list))
            .map(|a| (a.to_string(), AnswerSource::SuggestionMap))
            .or_else(|| {
                self.matcher
                    .lookup(&question, &snap.knowledge)
                    .map(|m| (m.answer.to_string(), AnswerSource::KnowledgeBase))
            });

        let (answer, source) = match local {
            Some(hit) => hit,
            None => self.generate(&question, history).await,
        };
        tracing::info!(
            target: "dspace::router",
            ?channel,
            topic = topic.unwrap_or("-"),
            source = ?source,
            suggestions = suggestions.len(),
            "message routed"
        );
        self.sink.record(InteractionRecord::now(
            channel.log_question(&question),
            answer.clone(),
            source,
        ));
        Reply {
            answer,
            source,
            suggestions,
        }
    }

    /// Knowledge then generator, no topics. Suggestions are always empty.
    pub async fn ask(&self, raw: &str) -> Reply {
        self.answer_direct(raw, Channel::Chat).await
    }

    async fn answer_direct(&self, raw: &str, channel: Channel) -> Reply {
        let question = channel.prepare(raw);
        if question.is_empty() {
            return Reply {
                answer: channel.empty_prompt().to_string(),
                source: AnswerSource::Error,
                suggestions: Vec::new(),
            };
        }
        let local = {
            let snap = self.catalog.snapshot();
            self.matcher
                .lookup(&question, &snap.knowledge)
                .map(|m| m.answer.to_string())
        };
        let (answer, source) = match local {
            Some(answer) => (answer, AnswerSource::KnowledgeBase),
            None => self.generate(&question, &[]).await,
        };
        tracing::info!(target: "dspace::router", ?channel, source = ?source, "message answered without topics");
        self.sink.record(InteractionRecord::now(
            channel.log_question(&question),
            answer.clone(),
            source,
        ));
        Reply {
            answer,
            source,
            suggestions: Vec::new(),
        }
    }

    async fn generate(&self, question: &str, history: &[HistoryTurn]) -> (String, AnswerSource) {
        let outcome = tokio::time::timeout(self.deadline, self.generator.answer(question, history))
            .await
            .unwrap_or(Err(GenerateError::Timeout));
        match outcome {
            Ok(text) => (text, AnswerSource::ExternalGenerator),
            Err(e) => {
                tracing::warn!(
                    target: "dspace::router",
                    generator = self.generator.name(),
                    error = %e,
                    "generator failed, answering with apology"
                );
                (GENERATOR_APOLOGY.to_string(), AnswerSource::Error)
            }
        }
    }
}
