//! Process-wide tracking of live relay sessions.
//!
//! Session-local state (DSP, retry, the RTSP socket) lives entirely inside
//! the connection task; this registry exists only so the process can count
//! and log concurrent sessions, mirroring the teacher's `WsConnectionManager`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// Tracks live relay sessions for counting and logging.
pub struct SessionRegistry {
    sessions: DashMap<String, ()>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a new session and returns an RAII guard that unregisters it
    /// on drop, regardless of how the connection task exits.
    pub fn register(self: &Arc<Self>) -> SessionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session_id = format!("talk-{id}");
        self.sessions.insert(session_id.clone(), ());
        log::info!(
            "[Relay] session registered: {session_id} (total: {})",
            self.sessions.len()
        );
        SessionGuard {
            id: session_id,
            registry: Arc::clone(self),
        }
    }

    /// Current number of live sessions.
    #[must_use]
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    fn unregister(&self, id: &str) {
        if self.sessions.remove(id).is_some() {
            log::info!(
                "[Relay] session unregistered: {id} (remaining: {})",
                self.sessions.len()
            );
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by [`SessionRegistry::register`].
pub struct SessionGuard {
    id: String,
    registry: Arc<SessionRegistry>,
}

impl SessionGuard {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.unregister(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_increments_and_drop_decrements_count() {
        let registry = Arc::new(SessionRegistry::new());
        assert_eq!(registry.count(), 0);

        let guard = registry.register();
        assert_eq!(registry.count(), 1);

        drop(guard);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn multiple_sessions_get_distinct_ids() {
        let registry = Arc::new(SessionRegistry::new());
        let a = registry.register();
        let b = registry.register();
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.count(), 2);
    }
}
