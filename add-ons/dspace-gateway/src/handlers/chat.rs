//! Visitor-facing endpoints used by the chat widget: messages, quick replies, menu, ratings and
//! bookings.
//!
//! The three message endpoints always answer with JSON, even for a malformed body.

use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dspace_core::{
    answer_in_any_topic, suggestions_for, BookingError, BookingRequest, Channel, HistoryTurn,
    Reply,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChatRequest {
    #[serde(default)]
    message: String,
    /// Earlier turns forwarded to the generator.
    #[serde(default)]
    history: Vec<HistoryTurn>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QuestionRequest {
    #[serde(default)]
    question: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FeedbackRequest {
    #[serde(default)]
    question: String,
    #[serde(default)]
    feedback: String,
}

/// Malformed bodies are treated as an empty message.
fn body_or_default<T: Default>(body: Result<Json<T>, JsonRejection>, endpoint: &str) -> T {
    match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::debug!(target: "dspace::gateway", endpoint, error = %rejection, "unreadable request body");
            T::default()
        }
    }
}

/// POST /chat – full routing pipeline with suggestions.
pub(crate) async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Json<Reply> {
    let req = body_or_default(body, "/chat");
    Json(
        state
            .router
            .route_with_history(&req.message, Channel::Chat, &req.history)
            .await,
    )
}

/// POST /voice-ask – speech-to-text input, knowledge then generator without topics.
pub(crate) async fn voice_ask(
    State(state): State<AppState>,
    body: Result<Json<QuestionRequest>, JsonRejection>,
) -> Json<serde_json::Value> {
    let req = body_or_default(body, "/voice-ask");
    let reply = state.router.route(&req.question, Channel::Voice).await;
    Json(json!({ "answer": reply.answer, "source": reply.source }))
}

/// POST /ask – knowledge base then generator, no topics.
pub(crate) async fn ask(
    State(state): State<AppState>,
    body: Result<Json<QuestionRequest>, JsonRejection>,
) -> Json<serde_json::Value> {
    let req = body_or_default(body, "/ask");
    let reply = state.router.ask(&req.question).await;
    Json(json!({ "answer": reply.answer, "source": reply.source }))
}

/// POST /suggestion-answer – canned answer of a quick reply, searched across every topic.
pub(crate) async fn suggestion_answer(
    State(state): State<AppState>,
    body: Result<Json<QuestionRequest>, JsonRejection>,
) -> Response {
    let req = body_or_default(body, "/suggestion-answer");
    let question = req.question.trim();
    if question.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "answer": "❌ Вопрос не указан" }))).into_response();
    }
    let snap = state.catalog.snapshot();
    match answer_in_any_topic(question, &snap.topics) {
        Some(answer) => Json(json!({ "answer": answer })).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "answer": "❌ Ответ не найден" }))).into_response(),
    }
}

/// GET /suggestions/:topic – buttons for a topic, default buttons for unknown ones.
pub(crate) async fn suggestions_by_topic(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Json<serde_json::Value> {
    let topic = topic.trim().to_lowercase();
    let snap = state.catalog.snapshot();
    // unknown or emptied topics both get the default list
    let requested = Some(topic.as_str())
        .filter(|t| snap.topics.get(t).is_some_and(|list| !list.is_empty()));
    let buttons = suggestions_for(requested, &snap.topics);
    Json(json!({ "suggestions": buttons }))
}

/// GET /suggestions/all – every topic with its suggestions.
pub(crate) async fn all_suggestions(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!(state.catalog.snapshot().topics))
}

/// GET /api/menu-display – menu buttons as the widget renders them.
pub(crate) async fn menu_display(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snap = state.catalog.snapshot();
    let items: Vec<serde_json::Value> = snap
        .menu
        .iter()
        .map(|item| {
            json!({
                "text": item.display_text,
                "question": item.question,
                "suggestion_topic": item.suggestion_topic,
            })
        })
        .collect();
    Json(json!(items))
}

/// GET /menu-items
pub(crate) async fn menu_items(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "items": state.catalog.snapshot().menu }))
}

/// GET /menu-items/:category
pub(crate) async fn menu_items_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Json<serde_json::Value> {
    Json(json!({ "items": state.catalog.snapshot().menu_in_category(&category) }))
}

/// POST /feedback – like/dislike on an answer.
pub(crate) async fn feedback(
    State(state): State<AppState>,
    Json(req): Json<FeedbackRequest>,
) -> Json<serde_json::Value> {
    match state.feedback.add(&req.question, &req.feedback).await {
        Ok(_) => Json(json!({ "status": "ok" })),
        Err(e) => {
            tracing::error!(target: "dspace::gateway", error = %e, "failed to save feedback");
            Json(json!({ "status": "error", "message": e.to_string() }))
        }
    }
}

/// POST /booking – booking form; every field is required.
pub(crate) async fn booking(
    State(state): State<AppState>,
    Json(req): Json<BookingRequest>,
) -> Response {
    match state.bookings.add(req).await {
        Ok(booking) => Json(json!({
            "status": "ok",
            "id": booking.id,
            "message": "Спасибо! Мы свяжемся с вами.",
        }))
        .into_response(),
        Err(BookingError::Missing(fields)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "error",
                "message": "Заполните все поля формы",
                "missing": fields,
            })),
        )
            .into_response(),
        Err(BookingError::Store(e)) => {
            tracing::error!(target: "dspace::gateway", error = %e, "failed to save booking");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": e.to_string() })),
            )
                .into_response()
        }
    }
}
