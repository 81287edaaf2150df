//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → request.rs (path, session cookie, bearer credential)
//!     → SessionManager::open (per-session lock)
//!     → Dispatcher::dispatch_path
//!     → SessionGuard::commit
//!     → response.rs (outcome → status, cookie)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
