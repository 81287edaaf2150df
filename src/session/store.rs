//! Session storage and persistence.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::observability::metrics;
use crate::session::registry::HandlerSnapshot;

/// Errors from session storage.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("session serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to snapshot controller {handler:?}: {message}")]
    Snapshot { handler: String, message: String },
}

/// Opaque session identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything persisted between two requests of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub controllers: BTreeMap<String, HandlerSnapshot>,
    /// Normalized path of the last executed route.
    #[serde(default)]
    pub referrer: Option<String>,
}

/// Pluggable persistence of session snapshots.
pub trait SessionStore: Send + Sync {
    fn load(&self, id: &SessionId) -> Result<Option<SessionSnapshot>, SessionError>;

    fn save(&self, id: &SessionId, snapshot: SessionSnapshot) -> Result<(), SessionError>;

    fn remove(&self, id: &SessionId) -> Result<(), SessionError>;
}

/// Stored snapshot plus the time it was last saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    #[serde(flatten)]
    snapshot: SessionSnapshot,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    saved_at: u64,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// In-memory store with optional JSON file persistence.
///
/// With a maximum lifetime set, a session not saved within that span is
/// expired: `load` no longer returns it and `purge_expired` drops it.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<DashMap<SessionId, StoredSession>>,
    persistence_path: Option<PathBuf>,
    max_lifetime: Option<Duration>,
}

impl MemorySessionStore {
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            persistence_path,
            max_lifetime: None,
        }
    }

    /// Expire sessions idle for longer than `lifetime`.
    pub fn with_max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = Some(lifetime);
        self
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime
    }

    /// Load from file if it exists; later saves go to the same file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let store = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let sessions: HashMap<SessionId, StoredSession> = serde_json::from_reader(reader)?;
            for (id, stored) in sessions {
                store.inner.insert(id, stored);
            }
            metrics::record_session_store_size(store.inner.len());
            tracing::info!(path = %path.display(), sessions = store.inner.len(), "Loaded sessions from file");
        }
        Ok(store)
    }

    /// Write every live session to the persistence file, if one is configured.
    pub fn save_to_file(&self) -> Result<(), SessionError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let now = now_millis();
        let sessions: HashMap<SessionId, StoredSession> = self
            .inner
            .iter()
            .filter(|r| !self.is_expired(r.value(), now))
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, &sessions)?;
        writer.flush()?;
        tracing::info!(path = %path.display(), sessions = sessions.len(), "Saved sessions to file");
        Ok(())
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        if self.max_lifetime.is_none() {
            return 0;
        }
        let now = now_millis();
        let before = self.inner.len();
        self.inner.retain(|_, stored| !self.is_expired(stored, now));
        let removed = before.saturating_sub(self.inner.len());

        metrics::record_session_store_size(self.inner.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.inner.len(), "Purged expired sessions");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn is_expired(&self, stored: &StoredSession, now: u64) -> bool {
        match self.max_lifetime {
            Some(lifetime) => now.saturating_sub(stored.saved_at) > lifetime.as_millis() as u64,
            None => false,
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, id: &SessionId) -> Result<Option<SessionSnapshot>, SessionError> {
        let now = now_millis();
        match self.inner.get(id) {
            None => return Ok(None),
            Some(stored) if !self.is_expired(stored.value(), now) => {
                return Ok(Some(stored.snapshot.clone()));
            }
            Some(_) => {}
        }

        // The read guard is released above; removing under it would deadlock.
        self.inner.remove_if(id, |_, stored| self.is_expired(stored, now));
        metrics::record_session_store_size(self.inner.len());
        tracing::debug!(session = %id, "Session expired");
        Ok(None)
    }

    fn save(&self, id: &SessionId, snapshot: SessionSnapshot) -> Result<(), SessionError> {
        self.inner.insert(
            id.clone(),
            StoredSession {
                snapshot,
                saved_at: now_millis(),
            },
        );
        metrics::record_session_store_size(self.inner.len());
        Ok(())
    }

    fn remove(&self, id: &SessionId) -> Result<(), SessionError> {
        self.inner.remove(id);
        metrics::record_session_store_size(self.inner.len());
        Ok(())
    }
}
