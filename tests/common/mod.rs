//! Shared harness for the integration tests: the full router wired against
//! the in-memory store, driven in-process with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use scribe_api::routes;
use scribe_api::state::AppState;
use scribe_api::store::{MemStore, NewUser, Store, User};

pub const PASSWORD: &str = "correct horse battery staple";

pub struct TestApp {
    pub router: axum::Router,
    pub store: Arc<MemStore>,
}

pub fn test_app() -> TestApp {
    let store = Arc::new(MemStore::new());
    let state = AppState::new(store.clone());
    TestApp {
        router: routes::app(state),
        store,
    }
}

/// Drive one request through the router and collect (status, headers, body).
/// Empty or non-JSON bodies come back as `Value::Null`.
pub async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router call is infallible");

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collect")
        .to_bytes();

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, headers, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Attach the session credential headers to any request.
pub fn with_auth(mut request: Request<Body>, token: Uuid, user_id: Uuid) -> Request<Body> {
    let headers = request.headers_mut();
    headers.insert("x-session-token", token.to_string().parse().unwrap());
    headers.insert("x-user-id", user_id.to_string().parse().unwrap());
    request
}

/// Seed a user directly in the store with the shared test password.
/// Low bcrypt cost keeps the suite fast.
pub async fn seed_user(store: &MemStore, email: &str) -> User {
    let password_hash = bcrypt::hash(PASSWORD, 4).expect("bcrypt");
    store
        .create_user(NewUser {
            name: "Test User".into(),
            email: email.into(),
            password_hash,
        })
        .await
        .expect("seed user")
}

/// Seed a user plus a live session; returns (user, session token).
pub async fn seed_identity(store: &MemStore, email: &str) -> (User, Uuid) {
    let user = seed_user(store, email).await;
    let session = store.create_session(user.id).await.expect("seed session");
    (user, session.id)
}
