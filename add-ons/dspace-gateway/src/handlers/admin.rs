//! Admin panel API: knowledge, menu, categories, suggestions, interaction logs, bookings.
//! Routes are mounted behind [`crate::auth::require_admin`].

use super::{ApiError, ApiResult};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use dspace_core::{MenuItem, Suggestion, DEFAULT_TOPIC, SYSTEM_CATEGORIES};
use serde::Deserialize;
use serde_json::{json, Value};

type JsonResult = ApiResult<Json<Value>>;

#[derive(Debug, Deserialize)]
pub(crate) struct SearchQuery {
    #[serde(default)]
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KnowledgeForm {
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KnowledgeUpdate {
    old_question: String,
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KnowledgeKey {
    question: String,
}

/// Menu button as submitted by the admin form; omitted fields take the stored defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct MenuItemForm {
    admin_text: String,
    display_text: String,
    question: String,
    category: String,
    price_info: String,
    suggestion_topic: String,
}

impl From<MenuItemForm> for MenuItem {
    fn from(f: MenuItemForm) -> Self {
        MenuItem::new(
            f.admin_text,
            f.display_text,
            f.question,
            f.category,
            f.price_info,
            f.suggestion_topic,
        )
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CategoryForm {
    key: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SuggestionForm {
    topic: String,
    #[serde(alias = "text")]
    label: String,
    question: String,
    answer: String,
}

impl SuggestionForm {
    fn into_parts(self) -> (String, Suggestion) {
        let topic = if self.topic.trim().is_empty() {
            DEFAULT_TOPIC.to_string()
        } else {
            self.topic
        };
        (topic, Suggestion::new(self.label, self.question, self.answer))
    }
}

// ---- knowledge ----

/// GET /admin/knowledge[?q=] – every entry, or those whose question contains `q`.
pub(crate) async fn list_knowledge(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Value> {
    let entries = match query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => state.catalog.search_knowledge(q),
        None => state.catalog.snapshot().knowledge.entries().to_vec(),
    };
    Json(json!({ "total": entries.len(), "entries": entries }))
}

/// POST /admin/knowledge – add or overwrite one entry.
pub(crate) async fn add_knowledge(
    State(state): State<AppState>,
    Json(form): Json<KnowledgeForm>,
) -> JsonResult {
    let replaced = state.catalog.add_knowledge(&form.question, &form.answer)?;
    Ok(Json(json!({ "success": true, "replaced": replaced.is_some() })))
}

/// PUT /admin/knowledge – rewrite an entry, possibly under a new question.
pub(crate) async fn update_knowledge(
    State(state): State<AppState>,
    Json(form): Json<KnowledgeUpdate>,
) -> JsonResult {
    state
        .catalog
        .update_knowledge(&form.old_question, &form.question, &form.answer)?;
    Ok(Json(json!({ "success": true })))
}

/// DELETE /admin/knowledge
pub(crate) async fn delete_knowledge(
    State(state): State<AppState>,
    Json(form): Json<KnowledgeKey>,
) -> JsonResult {
    state.catalog.delete_knowledge(&form.question)?;
    Ok(Json(json!({ "success": true })))
}

/// POST /admin/knowledge/import – JSON object of question -> answer. Non-string answers count
/// as errors.
pub(crate) async fn import_knowledge(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> JsonResult {
    let Value::Object(map) = body else {
        return Err(ApiError::bad_request("Некорректные данные"));
    };
    let mut rejected = 0;
    let pairs: Vec<(String, String)> = map
        .into_iter()
        .filter_map(|(question, answer)| match answer {
            Value::String(answer) => Some((question, answer)),
            _ => {
                rejected += 1;
                None
            }
        })
        .collect();
    let report = state.catalog.import_knowledge(pairs)?;
    let errors = report.error_count + rejected;
    Ok(Json(json!({
        "success": true,
        "success_count": report.success_count,
        "error_count": errors,
        "message": format!(
            "Импорт завершен: {} успешно, {} ошибок",
            report.success_count, errors
        ),
    })))
}

/// POST /admin/edit_response – store a corrected answer from the interaction log as knowledge.
pub(crate) async fn edit_response(
    State(state): State<AppState>,
    Json(form): Json<KnowledgeForm>,
) -> JsonResult {
    if form.question.trim().is_empty() || form.answer.trim().is_empty() {
        return Err(ApiError::bad_request("Некорректные данные"));
    }
    state.catalog.add_knowledge(&form.question, &form.answer)?;
    Ok(Json(json!({ "success": true, "status": "ok" })))
}

// ---- menu ----

/// GET /admin/menu – buttons (with their index) and categories.
pub(crate) async fn list_menu(State(state): State<AppState>) -> Json<Value> {
    let snap = state.catalog.snapshot();
    Json(json!({ "items": snap.menu, "categories": snap.categories }))
}

/// POST /admin/menu
pub(crate) async fn add_menu_item(
    State(state): State<AppState>,
    Json(form): Json<MenuItemForm>,
) -> JsonResult {
    state.catalog.add_menu_item(form.into())?;
    Ok(Json(json!({ "success": true })))
}

/// PUT /admin/menu/:index
pub(crate) async fn update_menu_item(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Json(form): Json<MenuItemForm>,
) -> JsonResult {
    state.catalog.update_menu_item(index, form.into())?;
    Ok(Json(json!({ "success": true })))
}

/// DELETE /admin/menu/:index
pub(crate) async fn delete_menu_item(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> JsonResult {
    let removed = state.catalog.delete_menu_item(index)?;
    Ok(Json(json!({ "success": true, "removed": removed })))
}

/// GET /admin/menu/categories
pub(crate) async fn list_categories(State(state): State<AppState>) -> Json<Value> {
    let system: Vec<&str> = SYSTEM_CATEGORIES.iter().map(|(key, _)| *key).collect();
    Json(json!({
        "categories": state.catalog.snapshot().categories,
        "system": system,
    }))
}

/// POST /admin/menu/categories
pub(crate) async fn add_category(
    State(state): State<AppState>,
    Json(form): Json<CategoryForm>,
) -> JsonResult {
    state.catalog.add_category(&form.key, &form.name)?;
    Ok(Json(json!({ "success": true })))
}

/// DELETE /admin/menu/categories/:key
pub(crate) async fn delete_category(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> JsonResult {
    let name = state.catalog.delete_category(&key)?;
    Ok(Json(json!({ "success": true, "message": format!("Категория '{name}' удалена") })))
}

// ---- suggestions ----

/// GET /admin/suggestions – every topic with answers.
pub(crate) async fn list_suggestions(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "topics": state.catalog.snapshot().topics }))
}

/// POST /admin/suggestions
pub(crate) async fn add_suggestion(
    State(state): State<AppState>,
    Json(form): Json<SuggestionForm>,
) -> JsonResult {
    let (topic, suggestion) = form.into_parts();
    state.catalog.add_suggestion(&topic, suggestion)?;
    Ok(Json(json!({ "success": true })))
}

/// PUT /admin/suggestions/:topic/:label – edit in place, or move when `topic` differs.
pub(crate) async fn update_suggestion(
    State(state): State<AppState>,
    Path((topic, label)): Path<(String, String)>,
    Json(form): Json<SuggestionForm>,
) -> JsonResult {
    let (new_topic, suggestion) = form.into_parts();
    state
        .catalog
        .update_suggestion(&topic, &label, &new_topic, suggestion)?;
    Ok(Json(json!({ "success": true })))
}

/// DELETE /admin/suggestions/:topic/:label
pub(crate) async fn delete_suggestion(
    State(state): State<AppState>,
    Path((topic, label)): Path<(String, String)>,
) -> JsonResult {
    state.catalog.delete_suggestion(&topic, &label)?;
    Ok(Json(json!({ "success": true })))
}

// ---- logs, bookings, reload ----

/// GET /admin/logs – answered questions, newest first.
pub(crate) async fn list_logs(State(state): State<AppState>) -> JsonResult {
    let logs = state.interactions.read_entries().await?;
    Ok(Json(json!({ "total": logs.len(), "logs": logs })))
}

/// GET /admin/export_logs – the raw JSON-lines file as a download.
pub(crate) async fn export_logs(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let bytes = state.interactions.export().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/x-ndjson"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"interactions.jsonl\""),
        ],
        bytes,
    ))
}

/// GET /admin/bookings
pub(crate) async fn list_bookings(State(state): State<AppState>) -> JsonResult {
    let bookings = state.bookings.list().await?;
    Ok(Json(json!({ "bookings": bookings })))
}

/// GET /admin/feedback
pub(crate) async fn list_feedback(State(state): State<AppState>) -> JsonResult {
    let feedback = state.feedback.list().await?;
    Ok(Json(json!({ "feedback": feedback })))
}

/// POST /admin/reload – re-read the catalog from storage.
pub(crate) async fn reload(State(state): State<AppState>) -> Json<Value> {
    let snap = state.catalog.reload();
    Json(json!({
        "success": true,
        "knowledge": snap.knowledge.len(),
        "menu": snap.menu.len(),
        "topics": snap.topics.names().count(),
        "categories": snap.categories.len(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::build_app;
    use crate::tests::{get_request, json_request, read_json, test_state};
    use axum::http::{header, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_add_knowledge_lowercases_and_trims_key() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), None).await;
        let catalog = state.catalog.clone();
        let app = build_app(state);

        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/admin/knowledge",
                json!({ "question": "  Где Парковка? ", "answer": " У входа " }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(read_json(res).await["replaced"], false);
        assert_eq!(catalog.snapshot().knowledge.get("где парковка?"), Some("У входа"));

        let res = app
            .clone()
            .oneshot(get_request("/admin/knowledge?q=%D0%9F%D0%90%D0%A0%D0%9A"))
            .await
            .unwrap();
        let json = read_json(res).await;
        assert_eq!(json["total"], 1);
        assert_eq!(json["entries"][0]["question"], "где парковка?");

        let res = app
            .oneshot(json_request("POST", "/admin/knowledge", json!({ "question": "x", "answer": "" })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(res).await["success"], false);
    }

    #[tokio::test]
    async fn test_update_and_delete_knowledge() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), None).await;
        let catalog = state.catalog.clone();
        let app = build_app(state);

        let res = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/admin/knowledge",
                json!({ "old_question": "пока", "question": "до свидания", "answer": "Ждём снова!" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let snap = catalog.snapshot();
        assert!(snap.knowledge.get("пока").is_none());
        assert_eq!(snap.knowledge.get("до свидания"), Some("Ждём снова!"));

        let res = app
            .clone()
            .oneshot(json_request("DELETE", "/admin/knowledge", json!({ "question": "до свидания" })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app
            .oneshot(json_request("DELETE", "/admin/knowledge", json!({ "question": "до свидания" })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_import_counts_errors() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), None).await;
        let catalog = state.catalog.clone();
        let app = build_app(state);
        let res = app
            .oneshot(json_request(
                "POST",
                "/admin/knowledge/import",
                json!({ "Часы работы": "С 10 до 22", "пусто": "", "число": 5 }),
            ))
            .await
            .unwrap();
        let json = read_json(res).await;
        assert_eq!(json["success_count"], 1);
        assert_eq!(json["error_count"], 2);
        assert_eq!(catalog.snapshot().knowledge.get("часы работы"), Some("С 10 до 22"));
    }

    #[tokio::test]
    async fn test_edit_response_becomes_knowledge() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), None).await;
        let router = state.router.clone();
        let app = build_app(state);
        let res = app
            .oneshot(json_request(
                "POST",
                "/admin/edit_response",
                json!({ "question": "Есть ли кафе?", "answer": "Да, на втором этаже." }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let reply = router.ask("есть ли кафе").await;
        assert_eq!(reply.answer, "Да, на втором этаже.");
    }

    #[tokio::test]
    async fn test_menu_crud_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), None).await;
        let catalog = state.catalog.clone();
        let app = build_app(state);

        let item = json!({
            "admin_text": "Квест",
            "display_text": "🧩 Квест-комната",
            "question": "КВЕСТ",
            "category": "attractions",
        });
        let res = app.clone().oneshot(json_request("POST", "/admin/menu", item.clone())).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let added = catalog.snapshot().menu[6].clone();
        assert_eq!(added.question, "квест");
        assert_eq!(added.suggestion_topic, "default");

        let res = app.clone().oneshot(json_request("POST", "/admin/menu", item)).await.unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let res = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/admin/menu/6",
                json!({ "admin_text": "Квест", "display_text": "🧩 Квесты", "question": "квест" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(catalog.snapshot().menu[6].display_text, "🧩 Квесты");

        let res = app
            .clone()
            .oneshot(json_request("DELETE", "/admin/menu/6", json!({})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(catalog.snapshot().menu.len(), 6);

        let res = app.oneshot(json_request("DELETE", "/admin/menu/42", json!({}))).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_categories() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(test_state(dir.path(), None).await);

        let res = app
            .clone()
            .oneshot(json_request("DELETE", "/admin/menu/categories/events", json!({})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/admin/menu/categories",
                json!({ "key": "Квесты", "name": "Квесты" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/admin/menu/categories",
                json!({ "key": "quests", "name": "Квесты" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let json = read_json(app.clone().oneshot(get_request("/admin/menu/categories")).await.unwrap()).await;
        assert_eq!(json["categories"]["quests"], "Квесты");
        assert_eq!(json["system"].as_array().unwrap().len(), 4);

        let res = app
            .oneshot(json_request("DELETE", "/admin/menu/categories/quests", json!({})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_suggestion_add_move_delete() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), None).await;
        let catalog = state.catalog.clone();
        let app = build_app(state);

        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/admin/suggestions",
                json!({ "topic": "VR", "text": "Возраст", "question": "С какого возраста VR", "answer": "С 8 лет." }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let vr = catalog.snapshot().topics.get("vr").unwrap().to_vec();
        assert_eq!(vr.last().unwrap().question, "с какого возраста vr");

        // label path segment is percent-encoded "Возраст"
        let uri = "/admin/suggestions/vr/%D0%92%D0%BE%D0%B7%D1%80%D0%B0%D1%81%D1%82";
        let res = app
            .clone()
            .oneshot(json_request(
                "PUT",
                uri,
                json!({ "topic": "батуты", "label": "Возраст", "question": "с какого возраста", "answer": "С 3 лет." }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let snap = catalog.snapshot();
        assert!(snap.topics.get("vr").unwrap().iter().all(|s| s.label != "Возраст"));
        assert_eq!(snap.topics.get("батуты").unwrap().last().unwrap().answer, "С 3 лет.");

        let uri = "/admin/suggestions/%D0%B1%D0%B0%D1%82%D1%83%D1%82%D1%8B/%D0%92%D0%BE%D0%B7%D1%80%D0%B0%D1%81%D1%82";
        let res = app.clone().oneshot(json_request("DELETE", uri, json!({}))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let res = app.oneshot(json_request("DELETE", uri, json!({}))).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_logs_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(test_state(dir.path(), None).await);
        for message in ["привет", "спасибо"] {
            app.clone()
                .oneshot(json_request("POST", "/chat", json!({ "message": message })))
                .await
                .unwrap();
        }

        let json = read_json(app.clone().oneshot(get_request("/admin/logs")).await.unwrap()).await;
        assert_eq!(json["total"], 2);
        assert_eq!(json["logs"][0]["question"], "спасибо");
        assert_eq!(json["logs"][0]["source"], "knowledge_base");

        let res = app.oneshot(get_request("/admin/export_logs")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("interactions.jsonl"));
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(String::from_utf8(bytes.to_vec()).unwrap().lines().count(), 2);
    }

    #[tokio::test]
    async fn test_reload_picks_up_store_changes() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(test_state(dir.path(), None).await);
        std::fs::write(
            dir.path().join("knowledge_base.json"),
            r#"{"часы работы": "С 10 до 22"}"#,
        )
        .unwrap();
        let json = read_json(
            app.clone()
                .oneshot(json_request("POST", "/admin/reload", json!({})))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(json["knowledge"], 1);

        let json = read_json(app.oneshot(get_request("/admin/knowledge")).await.unwrap()).await;
        assert_eq!(json["entries"][0]["question"], "часы работы");
    }

    #[tokio::test]
    async fn test_bookings_listed() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_app(test_state(dir.path(), None).await);
        app.clone()
            .oneshot(json_request(
                "POST",
                "/booking",
                json!({ "name": "Борис", "phone": "1", "date": "2026-12-01", "guests": "5", "event_type": "Выпускной" }),
            ))
            .await
            .unwrap();
        let json = read_json(app.oneshot(get_request("/admin/bookings")).await.unwrap()).await;
        assert_eq!(json["bookings"][0]["name"], "Борис");
    }
}
