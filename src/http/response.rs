//! Response handling.
//!
//! # Responsibilities
//! - Map dispatch outcomes and errors to HTTP status codes
//! - Attach the session cookie when a new session was issued
//!
//! # Design Decisions
//! - Error details are logged, never sent to the client
//! - Invalid routes are indistinguishable from unknown ones (404)

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::dispatch::{DispatchError, DispatchOutcome};
use crate::session::SessionId;

/// Everything the adapter learned from one dispatch.
#[derive(Debug)]
pub struct DispatchReply {
    pub result: Result<DispatchOutcome, DispatchError>,
    pub body: String,
    pub content_type: &'static str,
    /// Where a denied caller should be sent.
    pub login_redirect: Option<String>,
}

impl DispatchReply {
    pub fn status(&self) -> StatusCode {
        match &self.result {
            Ok(DispatchOutcome::Rendered) => StatusCode::OK,
            Ok(DispatchOutcome::NotFound) | Err(DispatchError::Route(_)) => StatusCode::NOT_FOUND,
            Ok(DispatchOutcome::NotAuthorized) if self.login_redirect.is_some() => StatusCode::SEE_OTHER,
            Ok(DispatchOutcome::NotAuthorized) => StatusCode::UNAUTHORIZED,
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DispatchReply {
    fn into_response(self) -> Response {
        let status = self.status();
        match status {
            StatusCode::OK => {
                (status, [(header::CONTENT_TYPE, self.content_type)], self.body).into_response()
            }
            StatusCode::SEE_OTHER => {
                let target = format!("/{}", self.login_redirect.unwrap_or_default().trim_start_matches('/'));
                (status, [(header::LOCATION, target)]).into_response()
            }
            _ => (status, status.canonical_reason().unwrap_or_default()).into_response(),
        }
    }
}

/// `Set-Cookie` value for a freshly issued session.
pub fn session_cookie_header(name: &str, id: &SessionId) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{name}={id}; Path=/; HttpOnly; SameSite=Lax")).ok()
}
