//! Participant Registry
//!
//! Maps participant ids to display names and the connection each was last
//! registered from. Identity is advisory: voting never consults this map.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::PollError;
use crate::model::{ConnectionId, Participant};

#[derive(Default)]
pub struct ParticipantRegistry {
    participants: RwLock<HashMap<String, Participant>>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the participant `id`.
    ///
    /// Re-registering keeps the original registration time but takes the new
    /// name and connection, so a reconnecting client keeps its identity.
    pub fn register(&self, id: &str, name: &str, connection: ConnectionId) -> Participant {
        let mut participants = self.participants.write();
        let registered_at = participants
            .get(id)
            .map(|p| p.registered_at)
            .unwrap_or_else(Utc::now);
        let participant = Participant {
            id: id.to_string(),
            name: name.to_string(),
            connection: Some(connection),
            registered_at,
        };
        participants.insert(id.to_string(), participant.clone());
        participant
    }

    pub fn lookup(&self, id: &str) -> Result<Participant, PollError> {
        self.participants
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| PollError::participant_not_found(id))
    }

    /// Connection the participant is currently reachable on.
    pub fn connection_of(&self, id: &str) -> Option<ConnectionId> {
        self.participants
            .read()
            .get(id)
            .and_then(|p| p.connection.clone())
    }

    /// Drop `connection` from every participant bound to it.
    ///
    /// Names and ids stay so the same participant can register again from a
    /// new connection. Returns how many entries were pruned.
    pub fn disconnect(&self, connection: &ConnectionId) -> usize {
        let mut pruned = 0;
        for participant in self.participants.write().values_mut() {
            if participant.connection.as_ref() == Some(connection) {
                participant.connection = None;
                pruned += 1;
            }
        }
        if pruned > 0 {
            debug!(conn_id = %connection, pruned, "Pruned participant connections");
        }
        pruned
    }

    /// All known participants, ordered by registration time.
    pub fn roster(&self) -> Vec<Participant> {
        let mut roster: Vec<_> = self.participants.read().values().cloned().collect();
        roster.sort_by(|a, b| a.registered_at.cmp(&b.registered_at).then(a.id.cmp(&b.id)));
        roster
    }

    pub fn len(&self) -> usize {
        self.participants.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = ParticipantRegistry::new();
        let conn = ConnectionId::new();
        registry.register("s1", "Ada", conn.clone());

        let p = registry.lookup("s1").unwrap();
        assert_eq!(p.name, "Ada");
        assert_eq!(p.connection, Some(conn));
    }

    #[test]
    fn test_lookup_unknown_is_not_found() {
        let registry = ParticipantRegistry::new();
        assert_eq!(
            registry.lookup("ghost").unwrap_err(),
            PollError::participant_not_found("ghost")
        );
    }

    #[test]
    fn test_reregister_overwrites_without_duplicating() {
        let registry = ParticipantRegistry::new();
        let first = registry.register("s1", "Ada", ConnectionId::new());
        let second_conn = ConnectionId::new();
        let second = registry.register("s1", "Ada L.", second_conn.clone());

        assert_eq!(registry.len(), 1);
        assert_eq!(second.name, "Ada L.");
        assert_eq!(second.registered_at, first.registered_at);
        assert_eq!(registry.connection_of("s1"), Some(second_conn));
    }

    #[test]
    fn test_names_need_not_be_unique() {
        let registry = ParticipantRegistry::new();
        registry.register("s1", "Sam", ConnectionId::new());
        registry.register("s2", "Sam", ConnectionId::new());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_disconnect_prunes_only_that_connection() {
        let registry = ParticipantRegistry::new();
        let gone = ConnectionId::new();
        let staying = ConnectionId::new();
        registry.register("s1", "Ada", gone.clone());
        registry.register("s2", "Bo", staying.clone());

        assert_eq!(registry.disconnect(&gone), 1);
        assert_eq!(registry.connection_of("s1"), None);
        assert_eq!(registry.connection_of("s2"), Some(staying));
        // Identity survives for reconnects
        assert_eq!(registry.lookup("s1").unwrap().name, "Ada");
        assert_eq!(registry.disconnect(&gone), 0);
    }

    #[test]
    fn test_roster_contains_everyone() {
        let registry = ParticipantRegistry::new();
        registry.register("s1", "Ada", ConnectionId::new());
        registry.register("s2", "Bo", ConnectionId::new());
        let ids: Vec<_> = registry.roster().into_iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"s1".to_string()));
        assert!(ids.contains(&"s2".to_string()));
    }
}
