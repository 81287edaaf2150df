//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! Request start:
//!     session id → manager.rs (acquire per-session lock)
//!     → store.rs (load SessionSnapshot)
//!     → registry.rs (rehydrate handler instances, reconcile access tables)
//!
//! Request end:
//!     registry.rs (snapshot controllers) → store.rs (save) → release lock
//!
//! Background:
//!     sweeper.rs → store.rs (drop sessions idle past session.max_lifetime)
//! ```
//!
//! # Design Decisions
//! - The registry is passed explicitly; there is no process-wide instance map
//! - Only controller state, access tables and layout names are persisted
//! - One request per session at a time; the lock spans load to save
//! - Client-presented ids are only honored if the store knows them

pub mod manager;
pub mod registry;
pub mod store;
pub mod sweeper;

pub use manager::{SessionContext, SessionGuard, SessionManager};
pub use registry::{HandlerInstance, HandlerRegistry, HandlerSnapshot};
pub use store::{MemorySessionStore, SessionError, SessionId, SessionSnapshot, SessionStore};
pub use sweeper::SessionSweeper;
