//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Raw request path ("Blog\Edit/5.html")
//!     → resolver.rs (clean separators, strip extension, split)
//!     → casing.rs (normalize handler/action identifiers)
//!     → route.rs (validated Route { handler, action, params })
//! ```
//!
//! # Design Decisions
//! - Resolution is pure: same input always yields the same Route
//! - Invalid identifiers fail the whole parse, never a partial Route
//! - A numeric second segment is always a parameter, never an action
//! - Casing policy lives behind a trait so links and routes agree

pub mod casing;
pub mod resolver;
pub mod route;

pub use casing::{DefaultCasing, NameCasing};
pub use resolver::{normalize_path, RouteResolver};
pub use route::{Route, RouteError};
