//! Front controller library.
//!
//! Routes request paths to controller actions kept alive per session,
//! gated by per-action access levels.

pub mod config;
pub mod controller;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;
pub mod session;

pub use config::{AppConfig, ConfigSource, ConfigStore};
pub use controller::{ActionContext, ActionError, ActionSpec, Controller, ControllerDescriptor, ControllerRegistry, Setup};
pub use dispatch::{DispatchError, DispatchOutcome, Dispatcher, Exchange};
pub use http::HttpServer;
pub use lifecycle::{Application, Shutdown};
pub use routing::{Route, RouteResolver};
pub use session::{SessionContext, SessionId};
