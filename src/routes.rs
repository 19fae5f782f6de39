//! Endpoint table and router assembly.

use axum::http::Method;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth;
use crate::dispatch::registry::{mount, Endpoint};
use crate::handler;
use crate::handlers::{articles, sessions, users};
use crate::state::AppState;

/// The declarative endpoint registry: one row per route, naming its verb,
/// path, handler, auth predicate (none = public) and parameter schema
/// (none = body never read). Built once at wiring, immutable afterwards.
pub fn endpoints() -> Vec<Endpoint> {
    vec![
        // Accounts
        Endpoint::new(Method::POST, "/users", handler!(users::register))
            .params(users::register_params()),
        Endpoint::new(Method::GET, "/user", handler!(users::me)).auth(auth::require_user),
        Endpoint::new(Method::GET, "/admin/users", handler!(users::list))
            .auth(auth::require_admin),
        // Sessions
        Endpoint::new(Method::POST, "/sessions", handler!(sessions::login))
            .params(sessions::login_params()),
        Endpoint::new(Method::DELETE, "/sessions", handler!(sessions::logout))
            .auth(auth::require_user),
        // Articles
        Endpoint::new(Method::GET, "/articles", handler!(articles::list)),
        Endpoint::new(Method::GET, "/articles/:slug", handler!(articles::get))
            .params(articles::get_params()),
        Endpoint::new(Method::POST, "/articles", handler!(articles::create))
            .auth(auth::require_user)
            .params(articles::create_params()),
        Endpoint::new(Method::PUT, "/articles/:slug", handler!(articles::update))
            .auth(auth::require_user)
            .params(articles::update_params()),
        Endpoint::new(Method::DELETE, "/articles/:slug", handler!(articles::delete))
            .auth(auth::require_user)
            .params(articles::delete_params()),
    ]
}

/// Full application router: the endpoint table plus the public service
/// routes, wrapped in the global middleware stack.
pub fn app(state: AppState) -> Router {
    let health_state = state.clone();

    mount(endpoints(), state)
        .route("/", get(root))
        .route(
            "/health",
            get(move || {
                let state = health_state.clone();
                async move { health(state).await }
            }),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "name": "Scribe API",
        "version": version,
        "endpoints": {
            "users": "POST /users (public), GET /user, GET /admin/users (admin)",
            "sessions": "POST /sessions (public), DELETE /sessions",
            "articles": "GET /articles[/:slug] (public), POST /articles, PUT|DELETE /articles/:slug",
            "health": "GET /health (public)",
        },
    }))
}

async fn health(state: AppState) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            axum::http::StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "store": "ok",
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "timestamp": now,
                "store_error": e.to_string(),
            })),
        ),
    }
}
