//! Axum-based gateway for the D-Space assistant: chat widget API, admin API and live log stream.
//! Config-driven via CoreConfig.

mod auth;
mod handlers;

use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method};
use axum::middleware;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post, put};
use axum::Router;
use dspace_core::{
    normalize, open_store, BookingBook, Catalog, ConversationRouter, CoreConfig, FeedbackBox,
    InteractionLog,
};
use dspace_skills::ModelRouter;
use handlers::{admin, chat};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing::field::Visit;
use tracing_subscriber::layer::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Captures the "message" field from a tracing event.
struct MessageCollector<'a>(&'a mut String);

impl Visit for MessageCollector<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            *self.0 = value.to_string();
        }
    }
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{:?}", value);
        }
    }
}

/// Sends each tracing event as a line to a broadcast channel for SSE log streaming.
#[derive(Clone)]
struct LogBroadcastLayer {
    tx: broadcast::Sender<String>,
}

impl LogBroadcastLayer {
    fn new(tx: broadcast::Sender<String>) -> Self {
        Self { tx }
    }
}

impl<S> tracing_subscriber::Layer<S> for LogBroadcastLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut MessageCollector(&mut message));
        let line = format!(
            "{} [{}] {}",
            event.metadata().level(),
            event.metadata().target(),
            message
        );
        let _ = self.tx.send(line);
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[dspace-gateway] .env not loaded: {} (using system environment)", e);
    }

    let (log_tx, _) = broadcast::channel(1000);
    let log_layer = LogBroadcastLayer::new(log_tx.clone());

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(log_layer)
        .init();

    if let Err(e) = run(log_tx).await {
        tracing::error!(target: "dspace::gateway", error = %e, "gateway stopped");
        std::process::exit(1);
    }
}

async fn run(log_tx: broadcast::Sender<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(CoreConfig::load()?);
    let data_dir = config.data_path();

    let store = open_store(&config)?;
    let catalog = Arc::new(Catalog::open(store));

    let (interactions, _writer) = InteractionLog::spawn(
        &data_dir,
        config.log_queue_capacity,
        config.log_backup_every,
    )
    .await?;

    let generator = ModelRouter::from_config(&config);
    tracing::info!(target: "dspace::gateway", mode = ?generator.mode(), "answer generator ready");

    let router = ConversationRouter::new(
        Arc::clone(&catalog),
        Arc::new(generator),
        Arc::new(interactions.clone()),
    )
    .with_deadline(config.generator_deadline());

    if config.admin_token.is_none() {
        tracing::warn!(target: "dspace::gateway", "admin_token is not set: /admin routes are open");
    }

    let app = build_app(AppState {
        config: Arc::clone(&config),
        catalog,
        router: Arc::new(router),
        interactions,
        bookings: Arc::new(BookingBook::new(&data_dir)),
        feedback: Arc::new(FeedbackBox::new(&data_dir)),
        log_tx,
    });

    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], config.port));
    tracing::info!("{} listening on {}", config.app_name, addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn frontend_root_dir() -> std::path::PathBuf {
    // Prefer a working-directory relative path for local development (run from workspace root).
    let cwd = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
    let from_cwd = cwd.join("frontend");
    if from_cwd.exists() {
        return from_cwd;
    }

    std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("frontend")
}

/// Browser origins on this machine: the widget dev server and the site preview.
fn is_local_origin(origin: &HeaderValue) -> bool {
    let s = origin.to_str().unwrap_or("");
    let host = s
        .split("://")
        .nth(1)
        .unwrap_or("")
        .split(':')
        .next()
        .unwrap_or("");
    host == "localhost" || host == "127.0.0.1"
}

fn build_app(state: AppState) -> Router {
    let frontend_enabled = state.config.frontend_enabled;

    // SSE needs browser-managed headers (Accept, Cache-Control), so any header is allowed.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| is_local_origin(origin)))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
        .expose_headers(tower_http::cors::Any);

    let admin_routes = Router::new()
        .route(
            "/admin/knowledge",
            get(admin::list_knowledge)
                .post(admin::add_knowledge)
                .put(admin::update_knowledge)
                .delete(admin::delete_knowledge),
        )
        .route("/admin/knowledge/import", post(admin::import_knowledge))
        .route("/admin/edit_response", post(admin::edit_response))
        .route("/admin/menu", get(admin::list_menu).post(admin::add_menu_item))
        .route(
            "/admin/menu/categories",
            get(admin::list_categories).post(admin::add_category),
        )
        .route(
            "/admin/menu/categories/:key",
            axum::routing::delete(admin::delete_category),
        )
        .route(
            "/admin/menu/:index",
            put(admin::update_menu_item).delete(admin::delete_menu_item),
        )
        .route(
            "/admin/suggestions",
            get(admin::list_suggestions).post(admin::add_suggestion),
        )
        .route(
            "/admin/suggestions/:topic/:label",
            put(admin::update_suggestion).delete(admin::delete_suggestion),
        )
        .route("/admin/logs", get(admin::list_logs))
        .route("/admin/logs/stream", get(logs_stream))
        .route("/admin/export_logs", get(admin::export_logs))
        .route("/admin/bookings", get(admin::list_bookings))
        .route("/admin/feedback", get(admin::list_feedback))
        .route("/admin/reload", post(admin::reload))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin));

    let mut app = Router::new()
        .route("/chat", post(chat::chat))
        .route("/voice-ask", post(chat::voice_ask))
        .route("/ask", post(chat::ask))
        .route("/suggestion-answer", post(chat::suggestion_answer))
        .route("/suggestions/all", get(chat::all_suggestions))
        .route("/suggestions/:topic", get(chat::suggestions_by_topic))
        .route("/api/menu-display", get(chat::menu_display))
        .route("/menu-items", get(chat::menu_items))
        .route("/menu-items/:category", get(chat::menu_items_by_category))
        .route("/feedback", post(chat::feedback))
        .route("/booking", post(chat::booking))
        .route("/api/v1/health", get(health))
        .route("/debug-normalize", get(debug_normalize))
        .merge(admin_routes)
        .with_state(state);

    if frontend_enabled {
        let frontend_dir = frontend_root_dir();
        let index_file = frontend_dir.join("index.html");

        // Map `/` -> `frontend/index.html`
        app = app.route_service("/", ServeFile::new(index_file));

        // Map `/static/*` -> `frontend/*` (widget script, styles, images)
        app = app.nest_service("/static", ServeDir::new(frontend_dir));
    }

    app.layer(cors)
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<CoreConfig>,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) router: Arc<ConversationRouter>,
    pub(crate) interactions: InteractionLog,
    pub(crate) bookings: Arc<BookingBook>,
    pub(crate) feedback: Arc<FeedbackBox>,
    pub(crate) log_tx: broadcast::Sender<String>,
}

/// GET /api/v1/health – liveness check for the widget and scripts.
async fn health(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    let snap = state.catalog.snapshot();
    axum::Json(serde_json::json!({
        "status": "ok",
        "app_name": state.config.app_name,
        "knowledge": snap.knowledge.len(),
        "menu": snap.menu.len(),
    }))
}

#[derive(Debug, Deserialize)]
struct NormalizeQuery {
    #[serde(default)]
    text: String,
}

/// GET /debug-normalize?text= – shows what the matcher compares against.
async fn debug_normalize(Query(q): Query<NormalizeQuery>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "original": q.text,
        "normalized": normalize(&q.text),
    }))
}

/// GET /admin/logs/stream – Server-Sent Events stream of gateway logs (tracing output).
async fn logs_stream(
    State(state): State<AppState>,
) -> Sse<impl futures_util::Stream<Item = Result<Event, std::convert::Infallible>> + Send + 'static> {
    use async_stream::stream;
    let mut rx = state.log_tx.subscribe();
    let stream = stream! {
        loop {
            tokio::select! {
                r = rx.recv() => match r {
                    Ok(line) => yield Ok(Event::default().data(line)),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        yield Ok(Event::default().data(format!("... {} log lines dropped", n)));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    yield Ok(Event::default().comment("keepalive"));
                }
            }
        }
    };
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}
