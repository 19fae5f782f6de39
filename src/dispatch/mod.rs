//! Per-request dispatch state machine.
//!
//! Every matched request runs the same strict sequence:
//! Init -> Decode -> Authenticate -> Authorize -> Invoke -> Finalize,
//! terminal on the first failure. Panics raised anywhere between Decode and
//! Invoke are caught exactly once at this boundary, logged with the request's
//! correlation id, and rendered as a generic 500. Finalize (scoped resource
//! release) runs on every exit path.

pub mod context;
pub mod registry;
pub mod render;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequestParts, RawPathParams, Request};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Response};
use futures::FutureExt;

use crate::auth;
use crate::config;
use crate::error::ApiError;
use crate::state::AppState;

use context::RequestContext;
use registry::Endpoint;
use render::Reply;

pub async fn dispatch(
    endpoint: Arc<Endpoint>,
    state: AppState,
    req: Request,
) -> Response<Body> {
    // Init: allocate the per-request context and its correlation id.
    let mut ctx = RequestContext::new();

    let outcome = AssertUnwindSafe(run_phases(&endpoint, &state, &mut ctx, req))
        .catch_unwind()
        .await;

    let mut response = match outcome {
        Ok(Ok(reply)) => {
            render::reply(reply).unwrap_or_else(|err| render::error(&ctx.request_id, err))
        }
        Ok(Err(err)) => render::error(&ctx.request_id, err),
        Err(panic) => {
            // Logged once here, with the backtrace; rendering must not log
            // the same failure again.
            let detail = panic_detail(panic.as_ref());
            let backtrace = std::backtrace::Backtrace::force_capture();
            tracing::error!(
                request_id = %ctx.request_id,
                panic = %detail,
                %backtrace,
                "panic while serving request"
            );
            render::generic_error()
        }
    };

    // Finalize always runs: success, handled error, or panic.
    ctx.finalize();

    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response
            .headers_mut()
            .insert(render::REQUEST_ID_HEADER, value);
    }

    response
}

async fn run_phases(
    endpoint: &Endpoint,
    state: &AppState,
    ctx: &mut RequestContext,
    req: Request,
) -> Result<Reply, ApiError> {
    let (mut parts, body) = req.into_parts();

    // Credential headers are captured up front; the body may be consumed
    // by the decode phase before authentication runs.
    ctx.capture_auth_headers(&parts.headers);

    // Decode: skipped entirely when the endpoint declares no schema.
    if let Some(schema) = &endpoint.params {
        let path_vars = extract_path_vars(&mut parts).await;
        let req = Request::from_parts(parts, body);
        let max_in_memory = config::config().http.max_in_memory_body_bytes;
        let params = schema.decode(&path_vars, req, ctx, max_in_memory).await?;
        ctx.params = params;
    }

    // Authenticate: anonymous is fine, bad credentials are not.
    let identity = auth::resolve(
        state.store.as_ref(),
        ctx.session_token.as_deref(),
        ctx.user_id_header.as_deref(),
    )
    .await?;
    ctx.identity = identity;

    // Authorize: the endpoint's own predicate decides 401 vs 403.
    if let Some(predicate) = endpoint.auth {
        predicate(ctx)?;
    }

    // Invoke.
    (endpoint.handler)(ctx, state).await
}

async fn extract_path_vars(parts: &mut Parts) -> Vec<(String, String)> {
    match RawPathParams::from_request_parts(parts, &()).await {
        Ok(raw) => raw
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn panic_detail(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
