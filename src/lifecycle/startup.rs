//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the session store (restoring persisted sessions)
//! - Assemble the dispatcher from controllers, scripts and renderer
//! - Start background tasks (config watcher, metrics, session sweeper)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, ConfigStore, ConfigWatcher};
use crate::controller::ControllerRegistry;
use crate::dispatch::{Dispatcher, Renderer, ScriptCatalog};
use crate::observability::metrics;
use crate::lifecycle::Shutdown;
use crate::session::{MemorySessionStore, SessionError, SessionSweeper};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("session store: {0}")]
    Session(#[from] SessionError),

    #[error("config watcher: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Everything the transport needs, fully wired.
#[derive(Clone)]
pub struct Application {
    pub config: Arc<ConfigStore>,
    pub sessions: Arc<MemorySessionStore>,
    pub dispatcher: Arc<Dispatcher>,
}

impl Application {
    pub fn build(
        config: Arc<ConfigStore>,
        controllers: ControllerRegistry,
        scripts: Arc<dyn ScriptCatalog>,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, StartupError> {
        let settings = config.config();

        let sessions = match &settings.session.persistence_path {
            Some(path) => MemorySessionStore::load_from_file(path)?,
            None => MemorySessionStore::new(None),
        }
        .with_max_lifetime(Duration::from_secs(settings.session.max_lifetime));
        sessions.purge_expired();

        tracing::info!(
            controllers = controllers.len(),
            auth_enabled = settings.auth.enabled,
            default_controller = %settings.application.default_controller,
            "Application assembled"
        );

        let dispatcher = Dispatcher::new(Arc::new(controllers), renderer, config.clone())
            .with_scripts(scripts);

        Ok(Self {
            config,
            sessions: Arc::new(sessions),
            dispatcher: Arc::new(dispatcher),
        })
    }

    /// Start the metrics endpoint if enabled.
    pub fn start_metrics(&self) {
        let settings = self.config.config();
        let observability = &settings.observability;
        if !observability.metrics_enabled {
            return;
        }
        match observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    /// Purge expired sessions every `session.sweep_interval_secs` until
    /// `shutdown` fires.
    pub fn spawn_session_sweeper(&self, shutdown: &Shutdown) -> JoinHandle<()> {
        let interval = Duration::from_secs(self.config.config().session.sweep_interval_secs);
        let sweeper = SessionSweeper::new(self.sessions.clone(), interval);
        tokio::spawn(sweeper.run(shutdown.subscribe()))
    }

    /// Watch `path` for configuration changes. Keep the returned watcher alive.
    pub fn watch_config(&self, path: &Path) -> Result<notify::RecommendedWatcher, StartupError> {
        Ok(ConfigWatcher::new(path, self.config.clone()).run()?)
    }

    /// Persist sessions, if a persistence file is configured.
    pub fn flush_sessions(&self) -> Result<(), SessionError> {
        self.sessions.save_to_file()
    }
}
