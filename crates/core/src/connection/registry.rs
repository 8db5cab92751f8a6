use std::sync::Arc;

use dashmap::DashMap;

use super::{ConnectionId, StreamConnection};
use crate::crypto::SharedSecret;
use crate::packet::InterledgerAddress;

/// Owned map of every connection a sender has used.
///
/// Two payments to the same destination with the same secret share one
/// [`StreamConnection`] and therefore one sequence counter. Closed connections are
/// kept so they can never be handed out fresh again.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<StreamConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(
        &self,
        destination: &InterledgerAddress,
        secret: &SharedSecret,
    ) -> Arc<StreamConnection> {
        let id = ConnectionId::derive(destination, secret);
        self.connections
            .entry(id)
            .or_insert_with(|| {
                let connection = StreamConnection::new(destination.clone(), secret.clone());
                tracing::debug!(connection = %connection.id(), %destination, "registered new connection");
                Arc::new(connection)
            })
            .value()
            .clone()
    }

    /// Registers a connection restored from persisted state. An entry already present
    /// in this registry is authoritative and returned unchanged.
    pub fn resume(
        &self,
        destination: &InterledgerAddress,
        secret: &SharedSecret,
        last_sequence: u64,
    ) -> Arc<StreamConnection> {
        let id = ConnectionId::derive(destination, secret);
        self.connections
            .entry(id)
            .or_insert_with(|| {
                Arc::new(StreamConnection::resume(
                    destination.clone(),
                    secret.clone(),
                    last_sequence,
                ))
            })
            .value()
            .clone()
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<StreamConnection>> {
        self.connections.get(id).map(|entry| entry.value().clone())
    }

    /// Closes a registered connection. Returns `false` if the id is unknown.
    pub fn close(&self, id: &ConnectionId) -> bool {
        match self.connections.get(id) {
            Some(entry) => {
                entry.value().close();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destination() -> InterledgerAddress {
        InterledgerAddress::new("test.receiver").unwrap()
    }

    #[test]
    fn same_key_yields_same_connection() {
        let registry = ConnectionRegistry::new();
        let secret = SharedSecret::random();
        let a = registry.get_or_create(&destination(), &secret);
        let b = registry.get_or_create(&destination(), &secret);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);

        a.next_sequence().unwrap();
        assert_eq!(b.next_sequence().unwrap(), 2);
    }

    #[test]
    fn concurrent_get_or_create_builds_one_instance() {
        let registry = Arc::new(ConnectionRegistry::new());
        let secret = SharedSecret::random();
        let conns: Vec<Arc<StreamConnection>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let registry = registry.clone();
                    let secret = secret.clone();
                    s.spawn(move || registry.get_or_create(&destination(), &secret))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(conns.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn closed_connections_are_not_resurrected() {
        let registry = ConnectionRegistry::new();
        let secret = SharedSecret::random();
        let conn = registry.get_or_create(&destination(), &secret);
        assert!(registry.close(conn.id()));

        let again = registry.get_or_create(&destination(), &secret);
        assert!(again.is_closed());
        assert!(again.next_sequence().is_err());

        let resumed = registry.resume(&destination(), &secret, 0);
        assert!(resumed.is_closed());
    }

    #[test]
    fn resume_restores_the_counter() {
        let registry = ConnectionRegistry::new();
        let secret = SharedSecret::random();
        let conn = registry.resume(&destination(), &secret, 41);
        assert_eq!(conn.next_sequence().unwrap(), 42);
        assert!(registry.get(conn.id()).is_some());
        assert!(!registry.is_empty());
    }
}
