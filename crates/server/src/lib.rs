//! Clarydo HTTP server: Axum routes over SQLite.

pub mod access;
pub mod config;
pub mod error;
pub mod extract;
pub mod notify;
pub mod push;
pub mod routes;
pub mod storage;

use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    routing::{get, patch, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

pub use config::AppConfig;
use push::PushSender;
use storage::Db;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: AppConfig,
    pub push: Arc<dyn PushSender>,
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn PushSender> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.push)
    }
}

/// Build the full router: `/api` routes plus the static web build when `web_dir` exists.
pub fn build_router(state: AppState, web_dir: Option<&Path>) -> Router {
    let api = Router::new()
        // Health
        .route("/health", get(routes::health::health))
        // Auth
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/check-username", post(routes::auth::check_username))
        // Lists
        .route(
            "/lists",
            get(routes::lists::list_lists).post(routes::lists::create_list),
        )
        .route(
            "/lists/{id}",
            patch(routes::lists::update_list).delete(routes::lists::delete_list),
        )
        .route("/lists/{id}/join", post(routes::lists::join_list))
        // Todos
        .route(
            "/todos",
            get(routes::todos::list_todos).post(routes::todos::create_todo),
        )
        .route(
            "/todos/{id}",
            patch(routes::todos::update_todo).delete(routes::todos::delete_todo),
        )
        // Members
        .route("/list-members", post(routes::list_members::add_member))
        .route(
            "/list-members/{list_id}",
            get(routes::list_members::list_members).delete(routes::list_members::remove_member),
        )
        // Invites
        .route("/list-invites", post(routes::list_invites::create_invite))
        .route("/list-invites/latest", get(routes::list_invites::latest_invite))
        .route(
            "/list-invites/{id}/accept",
            post(routes::list_invites::accept_invite),
        )
        .route(
            "/list-invites/{id}/decline",
            post(routes::list_invites::decline_invite),
        )
        // Push
        .route(
            "/push-subscription",
            post(routes::push_subscription::subscribe).delete(routes::push_subscription::unsubscribe),
        )
        .route("/test-push", post(routes::push_subscription::test_push))
        // Presence
        .route("/presence", put(routes::presence::heartbeat))
        .route("/presence/{list_id}", get(routes::presence::active_users))
        .fallback(routes::not_found);

    let mut app = Router::new().nest("/api", api);

    if let Some(web_dir) = web_dir.filter(|dir| dir.exists()) {
        tracing::info!("serving static files from {}", web_dir.display());
        let index_html = web_dir.join("index.html");
        app = app.fallback_service(ServeDir::new(web_dir).fallback(ServeFile::new(index_html)));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
