//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all dispatch handler
//! - Wire up middleware (request ID, tracing, timeout)
//! - Open the caller's session, dispatch, commit
//! - Flush persisted sessions once the server has drained

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderMap, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::dispatch::{DispatchError, DispatchOutcome, Exchange};
use crate::http::request;
use crate::http::response::{session_cookie_header, DispatchReply};
use crate::lifecycle::{Application, Shutdown};
use crate::security::auth::BearerAuthenticator;
use crate::session::{SessionContext, SessionError, SessionId, SessionManager};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub app: Application,
    pub sessions: Arc<SessionManager>,
}

/// HTTP front end of the dispatcher.
pub struct HttpServer {
    router: Router,
    app: Application,
}

impl HttpServer {
    pub fn new(app: Application) -> Self {
        let sessions = Arc::new(SessionManager::new(
            app.sessions.clone(),
            app.dispatcher.controllers().clone(),
        ));
        let state = AppState {
            app: app.clone(),
            sessions,
        };

        let router = Self::build_router(&app.config.config(), state);
        Self { router, app }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        Router::new()
            .route("/", any(dispatch_handler))
            .route("/{*path}", any(dispatch_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then persist sessions.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("HTTP server stopped");
        if let Err(e) = self.app.flush_sessions() {
            tracing::error!(error = %e, "Failed to persist sessions");
        }
        Ok(())
    }
}

/// Catch-all handler: every path goes through the dispatcher.
async fn dispatch_handler(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let settings = state.app.config.config();
    let path = request::dispatch_path(&uri);
    let request_id = request::request_id(&headers).to_string();

    let cookie_name = settings.session.cookie_name.as_str();
    let presented = request::session_cookie(&headers, cookie_name);
    let mut auth = BearerAuthenticator::from_header(
        request::authorization(&headers),
        &settings.auth.tokens,
        settings.auth.login_route.clone(),
    );

    tracing::debug!(
        request_id = %request_id,
        path = %path,
        presented_session = presented.is_some(),
        "Dispatching request"
    );

    let persistent = settings.application.session_autostart || settings.auth.enabled;
    let dispatched = if persistent {
        dispatch_in_session(&state, &path, presented, &mut auth).await
    } else {
        let mut session = SessionContext::new(SessionId::generate());
        let (result, body) = run_dispatch(&state, &path, &mut session, &mut auth);
        Ok((result, body, None))
    };

    let (result, body, issued) = match dispatched {
        Ok(dispatched) => dispatched,
        Err(e) => return session_failure(&request_id, e),
    };

    if let Err(e) = &result {
        tracing::error!(request_id = %request_id, path = %path, error = %e, "Dispatch failed");
    }

    let reply = DispatchReply {
        result,
        body,
        content_type: state.app.dispatcher.renderer().content_type(),
        login_redirect: auth.redirect().map(str::to_string),
    };
    let mut response = reply.into_response();

    if let Some(id) = issued {
        if let Some(cookie) = session_cookie_header(cookie_name, &id) {
            response.headers_mut().insert(header::SET_COOKIE, cookie);
        }
    }
    response
}

type Dispatched = (Result<DispatchOutcome, DispatchError>, String, Option<SessionId>);

/// Dispatch under the caller's stored session. Returns the id to hand out
/// when a new session was kept.
async fn dispatch_in_session(
    state: &AppState,
    path: &str,
    presented: Option<SessionId>,
    auth: &mut BearerAuthenticator,
) -> Result<Dispatched, SessionError> {
    let (mut session, issued) = state.sessions.resume(presented).await?;
    let (result, body) = run_dispatch(state, path, &mut session, auth);

    // A new session that created no handler has nothing worth keeping.
    if issued && session.handlers.is_empty() {
        return Ok((result, body, None));
    }

    let id = session.id().clone();
    session.commit()?;
    Ok((result, body, issued.then_some(id)))
}

fn run_dispatch(
    state: &AppState,
    path: &str,
    session: &mut SessionContext,
    auth: &mut BearerAuthenticator,
) -> (Result<DispatchOutcome, DispatchError>, String) {
    let mut ex = Exchange::new(session, auth);
    let result = state.app.dispatcher.dispatch_path(path, &mut ex);
    (result, ex.body)
}

fn session_failure(request_id: &str, error: SessionError) -> Response {
    tracing::error!(request_id = %request_id, error = %error, "Session storage failed");
    (
        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error",
    )
        .into_response()
}
