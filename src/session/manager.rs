//! Per-session serialization of the load → dispatch → save span.
//!
//! Two requests carrying the same session id never interleave: the second
//! waits on the session's mutex until the first has saved. Different
//! sessions do not contend.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::controller::ControllerRegistry;
use crate::session::registry::HandlerRegistry;
use crate::session::store::{SessionError, SessionId, SessionSnapshot, SessionStore};

/// Handler registry and request history of one session.
#[derive(Debug)]
pub struct SessionContext {
    id: SessionId,
    pub handlers: HandlerRegistry,
    referrer: Option<String>,
    current_route: Option<String>,
}

impl SessionContext {
    /// A context with no history, not backed by any store.
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            handlers: HandlerRegistry::new(),
            referrer: None,
            current_route: None,
        }
    }

    pub fn restore(id: SessionId, snapshot: SessionSnapshot, controllers: &ControllerRegistry) -> Self {
        Self {
            id,
            handlers: HandlerRegistry::restore(snapshot.controllers, controllers),
            referrer: snapshot.referrer,
            current_route: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Route executed by the previous request of this session.
    pub fn referrer(&self) -> Option<&str> {
        self.referrer.as_deref()
    }

    /// Route being executed by the current request.
    pub fn current_route(&self) -> Option<&str> {
        self.current_route.as_deref()
    }

    fn set_id(&mut self, id: SessionId) {
        self.id = id;
    }

    pub(crate) fn set_current_route(&mut self, route: impl Into<String>) {
        self.current_route = Some(route.into());
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let controllers = self
            .handlers
            .snapshot()
            .map_err(|(handler, e)| SessionError::Snapshot {
                handler,
                message: e.to_string(),
            })?;

        Ok(SessionSnapshot {
            controllers,
            referrer: self.current_route.clone().or_else(|| self.referrer.clone()),
        })
    }
}

/// Opens sessions from a store under a per-session lock.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    controllers: Arc<ControllerRegistry>,
    locks: DashMap<SessionId, Arc<Mutex<()>>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, controllers: Arc<ControllerRegistry>) -> Self {
        Self {
            store,
            controllers,
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Wait for exclusive access to `id`, then load its context.
    pub async fn open(&self, id: SessionId) -> Result<SessionGuard<'_>, SessionError> {
        let lock = self
            .locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let lock = lock.lock_owned().await;

        let snapshot = match self.store.load(&id) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                drop(lock);
                self.locks.remove_if(&id, |_, entry| Arc::strong_count(entry) <= 1);
                return Err(e);
            }
        };
        let known = snapshot.is_some();
        let snapshot = snapshot.unwrap_or_default();
        tracing::debug!(
            session = %id,
            known,
            handlers = snapshot.controllers.len(),
            "Session opened"
        );

        Ok(SessionGuard {
            manager: self,
            context: SessionContext::restore(id.clone(), snapshot, &self.controllers),
            lock_key: id,
            known,
            replaced: None,
            _lock: lock,
        })
    }

    /// Open the session a client presented, if the store knows it.
    ///
    /// Unknown or expired ids are never adopted: a fresh id is issued
    /// instead. The flag is `true` when the returned session is new.
    pub async fn resume(&self, presented: Option<SessionId>) -> Result<(SessionGuard<'_>, bool), SessionError> {
        if let Some(id) = presented {
            let session = self.open(id).await?;
            if session.is_known() {
                return Ok((session, false));
            }
            tracing::debug!(session = %session.id(), "Ignoring unknown session id");
        }
        Ok((self.open(SessionId::generate()).await?, true))
    }

    /// Remove a session from the store, waiting for any request using it.
    pub async fn destroy(&self, id: &SessionId) -> Result<(), SessionError> {
        let session = self.open(id.clone()).await?;
        session.destroy()
    }

    /// Move a session's state to a freshly generated id and return it.
    /// With `delete_old` the previous id stops resolving.
    pub async fn regenerate(&self, id: &SessionId, delete_old: bool) -> Result<SessionId, SessionError> {
        let mut session = self.open(id.clone()).await?;
        let new_id = session.regenerate(delete_old);
        session.commit()?;
        Ok(new_id)
    }

    /// Number of sessions with a live or cached lock entry.
    pub fn tracked_locks(&self) -> usize {
        self.locks.len()
    }
}

/// Exclusive access to one session. Changes are persisted by
/// [`commit`](Self::commit); dropping the guard discards them.
pub struct SessionGuard<'a> {
    manager: &'a SessionManager,
    context: SessionContext,
    /// Id the lock was taken under; stays put across `regenerate`.
    lock_key: SessionId,
    known: bool,
    /// Id to delete on commit after a regeneration.
    replaced: Option<SessionId>,
    _lock: OwnedMutexGuard<()>,
}

impl SessionGuard<'_> {
    /// Whether the store held this session before it was opened.
    pub fn is_known(&self) -> bool {
        self.known
    }

    /// Give the session a new random id. The state moves with it on
    /// commit; with `delete_old` the previous id is removed from the store.
    pub fn regenerate(&mut self, delete_old: bool) -> SessionId {
        let old = self.context.id().clone();
        let new_id = SessionId::generate();
        self.context.set_id(new_id.clone());
        if delete_old && self.known && self.replaced.is_none() {
            self.replaced = Some(old);
        }
        tracing::debug!(session = %new_id, "Session id regenerated");
        new_id
    }

    /// Save the session and release the lock.
    pub fn commit(self) -> Result<(), SessionError> {
        let snapshot = self.context.snapshot()?;
        self.manager.store.save(self.context.id(), snapshot)?;
        if let Some(old) = &self.replaced {
            self.manager.store.remove(old)?;
        }

        tracing::debug!(session = %self.context.id(), "Session committed");
        Ok(())
    }

    /// Delete the session from the store and release the lock.
    pub fn destroy(self) -> Result<(), SessionError> {
        self.manager.store.remove(&self.lock_key)?;
        if self.context.id() != &self.lock_key {
            self.manager.store.remove(self.context.id())?;
        }
        tracing::debug!(session = %self.lock_key, "Session destroyed");
        Ok(())
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        // Map entry plus the guard we still hold; anything more is a waiter.
        self.manager
            .locks
            .remove_if(&self.lock_key, |_, entry| Arc::strong_count(entry) <= 2);
    }
}

impl Deref for SessionGuard<'_> {
    type Target = SessionContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

impl DerefMut for SessionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ActionContext, ActionError, ActionSpec, Controller, ControllerDescriptor};
    use crate::session::registry::HandlerInstance;
    use crate::session::store::MemorySessionStore;
    use serde_json::Value;
    use std::time::Duration;

    static LEDGER: ControllerDescriptor = ControllerDescriptor {
        name: "ledger",
        actions: &[ActionSpec::new("index", 0)],
    };

    /// Controller whose state can never be persisted.
    struct Unsaveable;

    impl Controller for Unsaveable {
        fn descriptor(&self) -> &'static ControllerDescriptor {
            &LEDGER
        }

        fn invoke(&mut self, _: &str, _: &[String], _: &mut ActionContext<'_>) -> Result<(), ActionError> {
            Ok(())
        }

        fn snapshot(&self) -> Result<Value, ActionError> {
            Err(ActionError::failed("ledger is not serializable"))
        }
    }

    fn manager() -> (Arc<MemorySessionStore>, Arc<SessionManager>) {
        let store = Arc::new(MemorySessionStore::new(None));
        let manager = Arc::new(SessionManager::new(
            store.clone(),
            Arc::new(ControllerRegistry::new()),
        ));
        (store, manager)
    }

    #[tokio::test]
    async fn test_commit_persists_referrer() {
        let (store, manager) = manager();
        let id = SessionId::new("s1");

        let mut session = manager.open(id.clone()).await.unwrap();
        assert!(session.referrer().is_none());
        session.set_current_route("blog/show/1");
        session.commit().unwrap();

        let saved = store.load(&id).unwrap().unwrap();
        assert_eq!(saved.referrer.as_deref(), Some("blog/show/1"));

        let session = manager.open(id).await.unwrap();
        assert_eq!(session.referrer(), Some("blog/show/1"));
        assert!(session.current_route().is_none());
    }

    #[tokio::test]
    async fn test_dropped_guard_discards_changes() {
        let (store, manager) = manager();
        let id = SessionId::new("s2");
        {
            let mut session = manager.open(id.clone()).await.unwrap();
            session.set_current_route("blog/index");
        }
        assert!(store.load(&id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_session_is_serialized() {
        let (_, manager) = manager();
        let id = SessionId::new("shared");

        let first = manager.open(id.clone()).await.unwrap();

        let waiter = {
            let manager = manager.clone();
            let id = id.clone();
            tokio::spawn(async move {
                let session = manager.open(id).await.unwrap();
                let referrer = session.referrer().map(str::to_string);
                referrer
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        let mut first = first;
        first.set_current_route("index/index");
        first.commit().unwrap();

        let seen = waiter.await.unwrap();
        assert_eq!(seen.as_deref(), Some("index/index"));
    }

    #[tokio::test]
    async fn test_distinct_sessions_do_not_block() {
        let (_, manager) = manager();
        let _a = manager.open(SessionId::new("a")).await.unwrap();
        let b = tokio::time::timeout(Duration::from_millis(200), manager.open(SessionId::new("b"))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_idle_locks_are_pruned() {
        let (_, manager) = manager();
        let session = manager.open(SessionId::new("p")).await.unwrap();
        assert_eq!(manager.tracked_locks(), 1);
        session.commit().unwrap();
        assert_eq!(manager.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn test_failed_commit_still_releases_lock() {
        let (store, manager) = manager();
        for n in 0..10 {
            let mut session = manager.open(SessionId::new(format!("s{n}"))).await.unwrap();
            let instance = HandlerInstance::start(Box::new(Unsaveable)).unwrap();
            session.handlers.register("ledger", instance);
            assert!(matches!(session.commit(), Err(SessionError::Snapshot { .. })));
        }
        assert_eq!(manager.tracked_locks(), 0);
        assert!(store.is_empty());

        // The lock is usable again straight away.
        let reopened = tokio::time::timeout(Duration::from_millis(200), manager.open(SessionId::new("s0"))).await;
        assert!(reopened.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_guard_releases_lock() {
        let (_, manager) = manager();
        drop(manager.open(SessionId::new("d")).await.unwrap());
        assert_eq!(manager.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn test_resume_never_adopts_unknown_ids() {
        let (store, manager) = manager();

        let (session, issued) = manager.resume(None).await.unwrap();
        assert!(issued);
        let id = session.id().clone();
        session.commit().unwrap();

        let (session, issued) = manager.resume(Some(id.clone())).await.unwrap();
        assert!(!issued);
        assert_eq!(session.id(), &id);
        drop(session);

        let forged = SessionId::new("8f4e2c1a-0000-4000-8000-000000000000");
        let (session, issued) = manager.resume(Some(forged.clone())).await.unwrap();
        assert!(issued);
        assert_ne!(session.id(), &forged);
        drop(session);

        assert!(store.load(&forged).unwrap().is_none());
        assert_eq!(manager.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn test_destroy_removes_session() {
        let (store, manager) = manager();
        let id = SessionId::new("doomed");

        let mut session = manager.open(id.clone()).await.unwrap();
        session.set_current_route("blog/index");
        session.commit().unwrap();
        assert!(store.load(&id).unwrap().is_some());

        manager.destroy(&id).await.unwrap();
        assert!(store.load(&id).unwrap().is_none());
        assert!(!manager.open(id).await.unwrap().is_known());
    }

    #[tokio::test]
    async fn test_regenerate_moves_state_to_new_id() {
        let (store, manager) = manager();
        let id = SessionId::new("before");

        let mut session = manager.open(id.clone()).await.unwrap();
        session.set_current_route("blog/show/1");
        session.commit().unwrap();

        let new_id = manager.regenerate(&id, true).await.unwrap();
        assert_ne!(new_id, id);
        assert!(store.load(&id).unwrap().is_none());
        let moved = store.load(&new_id).unwrap().unwrap();
        assert_eq!(moved.referrer.as_deref(), Some("blog/show/1"));

        let kept = manager.regenerate(&new_id, false).await.unwrap();
        assert!(store.load(&new_id).unwrap().is_some());
        assert!(store.load(&kept).unwrap().is_some());
        assert_eq!(manager.tracked_locks(), 0);
    }
}
