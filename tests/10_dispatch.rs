//! Dispatcher behavior: correlation ids, the auth-header matrix, predicate
//! gating, and panic containment.

mod common;

use std::sync::Arc;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use scribe_api::dispatch::context::RequestContext;
use scribe_api::dispatch::registry::{mount, Endpoint};
use scribe_api::dispatch::render::Reply;
use scribe_api::error::ApiError;
use scribe_api::handler;
use scribe_api::state::AppState;
use scribe_api::store::MemStore;

#[tokio::test]
async fn request_id_is_present_and_unique_per_request() -> Result<()> {
    let app = common::test_app();

    let (_, first_headers, _) = common::send(&app, common::get("/articles")).await;
    let (_, second_headers, _) = common::send(&app, common::get("/articles")).await;

    let first = first_headers.get("x-request-id").expect("request id");
    let second = second_headers.get("x-request-id").expect("request id");
    assert!(!first.to_str()?.is_empty());
    assert_ne!(first, second);
    Ok(())
}

#[tokio::test]
async fn request_id_is_present_on_errors_too() -> Result<()> {
    let app = common::test_app();

    let (status, headers, _) = common::send(&app, common::get("/user")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.get("x-request-id").is_some());
    Ok(())
}

#[tokio::test]
async fn public_endpoint_is_reachable_anonymously() -> Result<()> {
    let app = common::test_app();

    let (status, _, body) = common::send(&app, common::get("/articles")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_array());
    Ok(())
}

#[tokio::test]
async fn protected_endpoint_rejects_anonymous_with_401() -> Result<()> {
    let app = common::test_app();

    let (status, _, body) = common::send(&app, common::get("/user")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authentication required");
    Ok(())
}

#[tokio::test]
async fn single_auth_header_is_400_even_on_public_routes() -> Result<()> {
    let app = common::test_app();
    let (user, token) = common::seed_identity(&app.store, "a@example.com").await;

    for (name, value) in [
        ("x-session-token", token.to_string()),
        ("x-user-id", user.id.to_string()),
    ] {
        let mut request = common::get("/articles");
        request.headers_mut().insert(name, value.parse()?);

        let (status, _, body) = common::send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "header: {}", name);
        assert_eq!(body["error"], "invalid auth data");
    }
    Ok(())
}

#[tokio::test]
async fn unknown_session_is_400() -> Result<()> {
    let app = common::test_app();
    let (user, _) = common::seed_identity(&app.store, "a@example.com").await;

    let request = common::with_auth(common::get("/user"), uuid::Uuid::new_v4(), user.id);
    let (status, _, body) = common::send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid auth data");
    Ok(())
}

#[tokio::test]
async fn session_of_deleted_user_is_400() -> Result<()> {
    let app = common::test_app();
    let (user, token) = common::seed_identity(&app.store, "a@example.com").await;

    // The session row itself is still live; only the owner is gone.
    app.store.soft_delete_user(user.id);

    let request = common::with_auth(common::get("/user"), token, user.id);
    let (status, _, body) = common::send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "user not found");
    Ok(())
}

#[tokio::test]
async fn admin_predicate_distinguishes_401_and_403() -> Result<()> {
    let app = common::test_app();

    let (status, _, _) = common::send(&app, common::get("/admin/users")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (user, token) = common::seed_identity(&app.store, "user@example.com").await;
    let request = common::with_auth(common::get("/admin/users"), token, user.id);
    let (status, _, _) = common::send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (admin, admin_token) = common::seed_identity(&app.store, "admin@example.com").await;
    app.store.set_admin(admin.id, true);
    let request = common::with_auth(common::get("/admin/users"), admin_token, admin.id);
    let (status, _, body) = common::send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));
    Ok(())
}

async fn boom(_ctx: &mut RequestContext, _state: &AppState) -> Result<Reply, ApiError> {
    panic!("integration test panic");
}

async fn leaky(_ctx: &mut RequestContext, _state: &AppState) -> Result<Reply, ApiError> {
    Err(ApiError::server_error("secret infrastructure detail"))
}

fn harness_app() -> common::TestApp {
    let store = Arc::new(MemStore::new());
    let state = AppState::new(store.clone());
    let router = mount(
        vec![
            Endpoint::new(Method::GET, "/boom", handler!(boom)),
            Endpoint::new(Method::GET, "/leaky", handler!(leaky)),
        ],
        state,
    );
    common::TestApp { router, store }
}

#[tokio::test]
async fn panicking_handler_yields_one_generic_500() -> Result<()> {
    let app = harness_app();

    let (status, headers, body) = common::send(&app, common::get("/boom")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Something went wrong" }));
    assert!(!headers.get("x-request-id").expect("request id").is_empty());
    Ok(())
}

#[tokio::test]
async fn dispatcher_survives_a_panic() -> Result<()> {
    let app = harness_app();

    // The panic is contained per-request; the app keeps serving.
    let (status, _, _) = common::send(&app, common::get("/boom")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _, _) = common::send(&app, common::get("/boom")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

#[tokio::test]
async fn server_error_detail_never_reaches_the_client() -> Result<()> {
    let app = harness_app();

    let (status, _, body) = common::send(&app, common::get("/leaky")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Something went wrong");
    assert!(!body.to_string().contains("secret"));
    Ok(())
}
