use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::trace;

pub trait SessionSource: Send + Sync {
    fn active_count(&self) -> usize;
}

/// Set of conversation ids currently considered active.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: RwLock<HashSet<String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the id was already registered.
    pub fn register_active(&self, session_id: impl Into<String>) -> bool {
        let session_id = session_id.into();
        trace!(session_id = %session_id, "Session registered");
        self.active.write().insert(session_id)
    }

    pub fn unregister_active(&self, session_id: &str) -> bool {
        trace!(session_id = %session_id, "Session unregistered");
        self.active.write().remove(session_id)
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.active.read().contains(session_id)
    }

    pub fn count(&self) -> usize {
        self.active.read().len()
    }
}

impl SessionSource for SessionRegistry {
    fn active_count(&self) -> usize {
        self.count()
    }
}
