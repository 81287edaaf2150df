//! Request handling.
//!
//! # Responsibilities
//! - Extract the dispatch path (percent-decoded, query dropped)
//! - Find the session id in the cookie header
//! - Extract the bearer credential
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A malformed session cookie is treated as absent, never as an error

use axum::http::{header, HeaderMap, Uri};
use percent_encoding::percent_decode_str;
use uuid::Uuid;

use crate::session::SessionId;

pub const X_REQUEST_ID: &str = "x-request-id";

/// The percent-decoded request path. The query string is not part of it.
pub fn dispatch_path(uri: &Uri) -> String {
    percent_decode_str(uri.path()).decode_utf8_lossy().into_owned()
}

/// Session id carried by cookie `name`. Only UUIDs are accepted.
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
        .map(|id| SessionId::new(id.to_string()))
}

/// Raw `Authorization` header value.
pub fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
}
