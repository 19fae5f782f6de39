use std::path::PathBuf;

use axum::http::HeaderMap;
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::auth::Identity;
use crate::params::Params;

/// Session credential headers. Both must be present together or absent together.
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";
pub const USER_ID_HEADER: &str = "x-user-id";

/// A multipart file part captured during decoding.
#[derive(Debug)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub body: UploadBody,
}

#[derive(Debug)]
pub enum UploadBody {
    /// Small uploads stay in memory.
    Memory(Vec<u8>),
    /// Oversized uploads live in a temp file owned by the request context.
    Spilled(PathBuf),
}

impl UploadBody {
    pub fn len(&self) -> usize {
        match self {
            UploadBody::Memory(bytes) => bytes.len(),
            UploadBody::Spilled(path) => std::fs::metadata(path)
                .map(|m| m.len() as usize)
                .unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-request mutable state: one instance per inbound HTTP call, never
/// shared across requests. Holds everything the dispatch phases accumulate
/// plus the scoped resources that must be released when the request ends.
pub struct RequestContext {
    /// Short opaque correlation id, echoed as `X-Request-Id` and attached to
    /// every server-side log line about this request.
    pub request_id: String,
    /// Raw credential headers captured at Init, consumed at Authenticate.
    pub session_token: Option<String>,
    pub user_id_header: Option<String>,
    /// Decoded parameters; empty when the endpoint declares no schema.
    pub params: Params,
    /// Resolved identity; `None` for anonymous requests.
    pub identity: Option<Identity>,
    /// Multipart file parts captured during decode.
    pub uploads: Vec<UploadedFile>,
    temp_files: Vec<NamedTempFile>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: new_request_id(),
            session_token: None,
            user_id_header: None,
            params: Params::default(),
            identity: None,
            uploads: Vec::new(),
            temp_files: Vec::new(),
        }
    }

    /// Capture credential headers before the request body is consumed.
    /// Empty values are treated as absent.
    pub fn capture_auth_headers(&mut self, headers: &HeaderMap) {
        self.session_token = header_value(headers, SESSION_TOKEN_HEADER);
        self.user_id_header = header_value(headers, USER_ID_HEADER);
    }

    /// Take ownership of a spilled upload's backing file so it is released
    /// at Finalize on every exit path, panics included.
    pub fn register_temp_file(&mut self, file: NamedTempFile) {
        self.temp_files.push(file);
    }

    /// Release all scoped resources. Runs exactly once per request,
    /// regardless of success, handled error, or panic.
    pub fn finalize(&mut self) {
        let count = self.temp_files.len();
        if count > 0 {
            tracing::debug!(
                request_id = %self.request_id,
                count,
                "releasing upload temp files"
            );
        }
        // NamedTempFile unlinks on drop.
        self.temp_files.clear();
        self.uploads.clear();
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// 12 hex chars of a v4 uuid: opaque, log-friendly, unique enough per request.
fn new_request_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}
