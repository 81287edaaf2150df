//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Resolved route (handler, action):
//!     → auth.rs (who is calling: authenticated? at which level?)
//!     → access_control.rs (which level does this action require?)
//!     → reachable: invoke action
//!     → denied: Authenticator::on_not_authorized (e.g. redirect to login)
//! ```
//!
//! # Design Decisions
//! - Fail closed: undeclared actions are errors, never silently allowed
//! - Access checks take `&self`; tables are only mutated during startup
//! - Level 0 and "open" are the same thing

pub mod access_control;
pub mod auth;

pub use access_control::{AccessControlError, AccessTable};
pub use auth::{Authenticator, BearerAuthenticator, FixedAuthenticator};
