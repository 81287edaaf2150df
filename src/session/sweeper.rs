//! Background removal of expired sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::session::store::MemorySessionStore;

/// Periodically purges sessions past their lifetime.
pub struct SessionSweeper {
    store: Arc<MemorySessionStore>,
    interval: Duration,
}

impl SessionSweeper {
    pub fn new(store: Arc<MemorySessionStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if self.store.max_lifetime().is_none() {
            tracing::info!("Session expiry disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            max_lifetime_secs = self.store.max_lifetime().map(|d| d.as_secs()),
            "Session sweeper starting"
        );

        let mut ticker = time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.store.purge_expired();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Session sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
