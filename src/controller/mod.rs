//! Controller subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (once per process):
//!     ControllerDescriptor (static: name, actions, arity)
//!     → registry.rs (handler name → descriptor + factory)
//!
//! Per request:
//!     handler name → registry lookup → factory → Box<dyn Controller>
//!     → start() (adjusts its AccessTable, picks a layout)
//!     → invoke(action, params) (fills the View)
//! ```
//!
//! # Design Decisions
//! - Action sets are declared, not discovered
//! - Persisted state is whatever `snapshot()` returns plus the layout name;
//!   views are rebuilt every request
//! - Controllers never see the session or other controllers

pub mod descriptor;
pub mod registry;
pub mod view;

use serde_json::Value;
use thiserror::Error;

use crate::routing::Route;
use crate::security::access_control::{AccessControlError, AccessTable};

pub use descriptor::{ActionSpec, ControllerDescriptor};
pub use registry::{ControllerRegistry, RegistryError};
pub use view::{Layout, View};

/// Failure raised by controller code.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    AccessControl(#[from] AccessControlError),

    #[error("controller state: {0}")]
    State(#[from] serde_json::Error),
}

impl ActionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// What a startup hook may configure.
pub struct Setup<'a> {
    pub access: &'a mut AccessTable,
    pub layout: &'a mut Option<Layout>,
}

/// What an action may touch while it runs.
pub struct ActionContext<'a> {
    pub view: &'a mut View,
    pub layout: &'a mut Option<Layout>,
    redirect: Option<Route>,
}

impl<'a> ActionContext<'a> {
    pub fn new(view: &'a mut View, layout: &'a mut Option<Layout>) -> Self {
        Self {
            view,
            layout,
            redirect: None,
        }
    }

    /// Re-dispatch to `route` once this action returns. The current view is
    /// discarded.
    pub fn redirect(&mut self, route: Route) {
        self.view.no_render();
        self.redirect = Some(route);
    }

    pub fn take_redirect(&mut self) -> Option<Route> {
        self.redirect.take()
    }
}

/// A handler object exposing named actions.
pub trait Controller: Send {
    fn descriptor(&self) -> &'static ControllerDescriptor;

    /// Startup hook. Runs exactly once, right after construction, and is the
    /// only place access levels may change.
    fn start(&mut self, _setup: &mut Setup<'_>) -> Result<(), ActionError> {
        Ok(())
    }

    /// Run `action` with positional `params`. The dispatcher has already
    /// checked that the action is declared and the arity fits.
    fn invoke(
        &mut self,
        action: &str,
        params: &[String],
        ctx: &mut ActionContext<'_>,
    ) -> Result<(), ActionError>;

    /// State carried to the next request of the session.
    fn snapshot(&self) -> Result<Value, ActionError> {
        Ok(Value::Null)
    }

    /// Inverse of [`snapshot`](Self::snapshot), applied to a fresh instance.
    fn restore(&mut self, _state: Value) -> Result<(), ActionError> {
        Ok(())
    }
}
