//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::loader::{parse_config, ConfigError};
use crate::config::store::ConfigStore;

/// Monitors the configuration file and swaps valid revisions into a store.
pub struct ConfigWatcher {
    path: PathBuf,
    store: Arc<ConfigStore>,
}

impl ConfigWatcher {
    pub fn new(path: &Path, store: Arc<ConfigStore>) -> Self {
        Self {
            path: path.to_path_buf(),
            store,
        }
    }

    /// Re-read the file now. On failure the store keeps its current value.
    pub fn reload(&self) -> Result<(), ConfigError> {
        reload_into(&self.path, &self.store)
    }

    /// Start watching the file in a background thread. The returned watcher
    /// must be kept alive for as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let store = self.store.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, reloading...");
                        if let Err(e) = reload_into(&path, &store) {
                            tracing::error!(
                                "Failed to reload config: {}. Keeping current configuration.",
                                e
                            );
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn reload_into(path: &Path, store: &ConfigStore) -> Result<(), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    let (config, extra) = parse_config(&content)?;
    store.replace(config, extra)?;
    tracing::info!(path = %path.display(), "Configuration reloaded");
    Ok(())
}
