//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! raw path
//!     → script.rs (registered script for the normalized path?)
//!         → auth gate (allowed_routes) → run → default layout → Rendered
//!     → RouteResolver
//!     → engine.rs
//!         → controller registered? action declared?      (else NotFound)
//!         → session registry: reuse or start instance
//!         → access table gate, when auth is enabled       (else NotAuthorized)
//!         → arity check → invoke → internal redirect?     (re-dispatch)
//!         → render.rs (layout or view)                    → Rendered
//! ```
//!
//! # Design Decisions
//! - NotFound and NotAuthorized are outcomes; only real failures are errors
//! - The dispatcher owns no session state; callers pass it in per request
//! - Configuration is read on every dispatch so reloads apply immediately

pub mod engine;
pub mod render;
pub mod script;

use thiserror::Error;

use crate::controller::ActionError;
use crate::routing::RouteError;
use crate::security::access_control::AccessControlError;

pub use engine::{Dispatcher, Exchange, MAX_REDIRECTS};
pub use render::{JsonRenderer, RenderError, RenderTarget, Renderer};
pub use script::{Script, ScriptCatalog, ScriptContext, ScriptTable};

/// How a dispatch ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Rendered,
    NotAuthorized,
    NotFound,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Rendered => "rendered",
            DispatchOutcome::NotAuthorized => "not_authorized",
            DispatchOutcome::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    AccessControl(#[from] AccessControlError),

    #[error("{route} takes {required} to {} parameters, got {actual}", .required + .optional)]
    Arity {
        route: String,
        required: usize,
        optional: usize,
        actual: usize,
    },

    #[error("startup of {handler:?} failed: {source}")]
    Startup {
        handler: String,
        #[source]
        source: ActionError,
    },

    #[error("{route} failed: {source}")]
    Action {
        route: String,
        #[source]
        source: ActionError,
    },

    #[error("script {path:?} failed: {source}")]
    Script {
        path: String,
        #[source]
        source: ActionError,
    },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("more than {0} internal redirects")]
    RedirectLoop(usize),
}

impl DispatchError {
    /// Metric label for the error.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Route(_) => "route",
            DispatchError::AccessControl(_) => "access_control",
            DispatchError::Arity { .. } => "arity",
            DispatchError::Startup { .. } => "startup",
            DispatchError::Action { .. } => "action",
            DispatchError::Script { .. } => "script",
            DispatchError::Render(_) => "render",
            DispatchError::RedirectLoop(_) => "redirect_loop",
        }
    }
}
