//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → store.rs (AppConfig + raw table behind ArcSwap)
//!     → read by the dispatcher through ConfigSource
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs parses and validates
//!     → ConfigStore::replace swaps atomically
//!     → next dispatch observes new values
//! ```
//!
//! # Design Decisions
//! - A revision that fails validation never replaces the current one
//! - All fields have defaults to allow minimal configs
//! - Sections outside the schema remain readable by key
//! - Values baked in at startup (listener, timeouts, logging) need a restart

pub mod loader;
pub mod schema;
pub mod store;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_store, parse_config, ConfigError};
pub use schema::AppConfig;
pub use store::{ConfigSource, ConfigStore};
pub use validation::ValidationError;
pub use watcher::ConfigWatcher;
