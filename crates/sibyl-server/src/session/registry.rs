//! Session registry: id allocation, lookup, and lifecycle observers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use sibyl_core::SessionId;

use super::handle::SessionHandle;

/// A session lifecycle transition, as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session was registered and can receive messages.
    Opened(SessionId),
    /// The session was deregistered. Its id is never reused.
    Closed(SessionId),
}

/// Callback invoked on session lifecycle transitions.
///
/// Observers fire synchronously and in registration order. They must not
/// register further observers from inside the callback.
pub type SessionObserver = Box<dyn Fn(SessionEvent) + Send + Sync>;

/// The only shared mutable state in the transport: the map of live sessions.
///
/// Ids come from the registry's own counter and are never reused, so a stale
/// token can never resolve to a newer session. The map is ordered by id,
/// which makes "most recently opened" the last entry.
pub struct SessionRegistry {
    sessions: RwLock<BTreeMap<SessionId, Arc<SessionHandle>>>,
    observers: RwLock<Vec<SessionObserver>>,
    next_id: AtomicU64,
    active: AtomicUsize,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            observers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            active: AtomicUsize::new(0),
        }
    }

    /// Allocate the next session id.
    pub fn allocate_id(&self) -> SessionId {
        SessionId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a session and notify observers.
    pub fn register(&self, handle: Arc<SessionHandle>) {
        let id = handle.id;
        {
            let mut sessions = self.sessions.write();
            let _ = sessions.insert(id, handle);
        }
        let _ = self.active.fetch_add(1, Ordering::Relaxed);
        self.notify(SessionEvent::Opened(id));
    }

    /// Deregister a session.
    ///
    /// Idempotent: closure signals can race (stream error, normal close,
    /// client disconnect), and only the first removal for a given id
    /// decrements the gauge and notifies observers.
    pub fn remove(&self, id: SessionId) {
        let removed = {
            let mut sessions = self.sessions.write();
            sessions.remove(&id).is_some()
        };
        if !removed {
            return;
        }
        let _ = self.active.fetch_sub(1, Ordering::Relaxed);
        self.notify(SessionEvent::Closed(id));
    }

    /// Look up a session by id.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions.read().get(&id).cloned()
    }

    /// The most recently opened session still registered.
    ///
    /// Routing target for control messages carrying no session token; only
    /// correct when a single client is connected.
    #[must_use]
    pub fn newest(&self) -> Option<Arc<SessionHandle>> {
        let sessions = self.sessions.read();
        sessions.last_key_value().map(|(_, handle)| handle.clone())
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Add a lifecycle observer.
    ///
    /// Consumers register their observers once, at transport startup; the
    /// open/close log lines themselves go through one (see
    /// `SibylServer::new`).
    pub fn observe(&self, observer: SessionObserver) {
        self.observers.write().push(observer);
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    fn notify(&self, event: SessionEvent) {
        let observers = self.observers.read();
        for observer in observers.iter() {
            observer(event);
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
