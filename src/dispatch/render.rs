//! Map handler outcomes and typed errors onto HTTP responses.

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use serde_json::{json, Value};

use crate::error::ApiError;

/// Response header carrying the request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// What clients see for any ServerError; the real detail only ever hits logs.
pub const GENERIC_SERVER_ERROR: &str = "Something went wrong";

/// Successful handler outcome.
#[derive(Debug)]
pub enum Reply {
    /// 200 with a JSON payload.
    Ok(Value),
    /// 201 with a JSON payload.
    Created(Value),
    /// 204, empty body.
    NoContent,
}

/// Render a success reply. A payload that fails to encode is itself a server
/// error and must be reported through the error path by the caller.
pub fn reply(reply: Reply) -> Result<Response<Body>, ApiError> {
    let (status, payload) = match reply {
        Reply::Ok(value) => (StatusCode::OK, Some(value)),
        Reply::Created(value) => (StatusCode::CREATED, Some(value)),
        Reply::NoContent => (StatusCode::NO_CONTENT, None),
    };

    match payload {
        Some(value) => {
            let body = serde_json::to_vec(&value)
                .map_err(|e| ApiError::server_error(format!("response encoding failed: {}", e)))?;
            json_response(status, body)
        }
        None => Response::builder()
            .status(status)
            .body(Body::empty())
            .map_err(|e| ApiError::server_error(format!("response build failed: {}", e))),
    }
}

/// Render a typed error. ServerError detail is logged with the correlation id
/// and replaced by a fixed generic body; other kinds echo their message, or
/// send a bare status line when the message is empty.
pub fn error(request_id: &str, err: ApiError) -> Response<Body> {
    let status = err.status();

    let body = match &err {
        ApiError::ServerError(detail) => {
            tracing::error!(request_id = %request_id, error = %detail, "request failed");
            return generic_error();
        }
        _ if err.message().is_empty() => None,
        _ => Some(json!({ "error": err.message() })),
    };

    match body {
        Some(value) => {
            // Encoding a flat {"error": ...} object cannot realistically
            // fail, but the fallback keeps this path total.
            let bytes = serde_json::to_vec(&value).unwrap_or_else(|_| b"{}".to_vec());
            json_response(status, bytes).unwrap_or_else(|_| fallback(status))
        }
        None => Response::builder()
            .status(status)
            .body(Body::empty())
            .unwrap_or_else(|_| fallback(status)),
    }
}

/// The fixed generic 500 response. Callers log the detail themselves before
/// rendering; this path emits nothing.
pub fn generic_error() -> Response<Body> {
    let bytes = serde_json::to_vec(&json!({ "error": GENERIC_SERVER_ERROR }))
        .unwrap_or_else(|_| b"{}".to_vec());
    json_response(StatusCode::INTERNAL_SERVER_ERROR, bytes)
        .unwrap_or_else(|_| fallback(StatusCode::INTERNAL_SERVER_ERROR))
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Result<Response<Body>, ApiError> {
    Response::builder()
        .status(status)
        .header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )
        .body(Body::from(body))
        .map_err(|e| ApiError::server_error(format!("response build failed: {}", e)))
}

fn fallback(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
