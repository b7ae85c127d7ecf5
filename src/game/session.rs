//! Session registry - live connection to player bindings

use dashmap::DashMap;
use uuid::Uuid;

/// A live connection's binding
#[derive(Debug, Clone)]
pub struct Session {
    pub tag: String,
    pub record_id: Uuid,
}

/// Registry of all connections currently bound to a player
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Bind a connection's player id for the rest of its life
    pub fn bind(&self, player_id: Uuid, tag: String, record_id: Uuid) {
        self.sessions.insert(player_id, Session { tag, record_id });
    }

    /// Unbind on leave/disconnect. Returns false if already unbound.
    pub fn unbind(&self, player_id: &Uuid) -> bool {
        self.sessions.remove(player_id).is_some()
    }

    pub fn player_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_and_unbind_round_trip() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();

        registry.bind(id, "alice".to_string(), Uuid::new_v4());
        assert_eq!(registry.player_count(), 1);

        assert!(registry.unbind(&id));
        assert_eq!(registry.player_count(), 0);

        // Unbinding again is a harmless no-op
        assert!(!registry.unbind(&id));
    }
}
