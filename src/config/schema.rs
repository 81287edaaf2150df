//! Configuration schema definitions.
//!
//! Sections mirror what the dispatcher and its transport ask for. All
//! fields have defaults so an empty file is a valid configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub application: ApplicationConfig,
    pub auth: AuthConfig,
    pub layout: LayoutConfig,
    pub session: SessionConfig,
    pub listener: ListenerConfig,
    pub timeouts: TimeoutConfig,
    pub observability: ObservabilityConfig,
}

/// Application-wide routing settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Handler used when a path names none.
    pub default_controller: String,

    /// Keep handler instances across requests even with auth disabled.
    pub session_autostart: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            default_controller: "index".to_string(),
            session_autostart: true,
        }
    }
}

/// Site-wide authorization.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Enforce access tables and script authentication.
    pub enabled: bool,

    /// Script routes reachable without authentication.
    pub allowed_routes: Vec<String>,

    /// Route unauthorized callers are redirected to.
    pub login_route: Option<String>,

    /// Bearer token → auth level.
    pub tokens: BTreeMap<String, u32>,
}

/// Layout defaults.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Layout wrapped around script output. Empty means none.
    pub default: String,
}

/// Session persistence.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// JSON file sessions are flushed to on shutdown.
    pub persistence_path: Option<String>,

    /// Cookie carrying the session id.
    pub cookie_name: String,

    /// Seconds a session survives without a request.
    pub max_lifetime: u64,

    /// Seconds between sweeps that drop expired sessions.
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persistence_path: None,
            cookie_name: "session_id".to_string(),
            max_lifetime: 1440,
            sweep_interval_secs: 60,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// `pretty` or `json`.
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
