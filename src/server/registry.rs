use std::net::SocketAddr;

use dashmap::{DashMap, DashSet};

/// The server's authoritative mapping of client IDs to remote addresses, plus the parallel
/// last-received-timestamp map and the required-but-not-yet-registered set.
///
/// Both `clients` and `last_received` are sharded concurrent maps (backed by `dashmap`) so the
/// registry tolerates concurrent reads from an I/O delivery context racing with mutation from the
/// processing thread, per the concurrency model: delivery may happen on the transport's own
/// thread, while `process()` ticks (liveness eviction, keep-alive) run on the host's thread.
pub struct ClientRegistry {
    clients: DashMap<u32, SocketAddr>,
    last_received: DashMap<u32, i64>,
    required_clients: DashSet<u32>,
}

impl ClientRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            last_received: DashMap::new(),
            required_clients: DashSet::new(),
        }
    }

    /// Whether `client_id` currently has a registry entry.
    pub fn is_registered(&self, client_id: u32) -> bool {
        self.clients.contains_key(&client_id)
    }

    /// Whether `addr` belongs to any currently-registered client.
    pub fn is_known_address(&self, addr: &SocketAddr) -> bool {
        self.clients.iter().any(|e| e.value() == addr)
    }

    /// The remote address for `client_id`, if registered.
    pub fn address_of(&self, client_id: u32) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|e| *e.value())
    }

    /// The last-received timestamp for `client_id`, if registered.
    pub fn last_received(&self, client_id: u32) -> Option<i64> {
        self.last_received.get(&client_id).map(|e| *e.value())
    }

    /// Inserts or refreshes `client_id → addr`, and marks the last-received timestamp.
    pub fn register(&self, client_id: u32, addr: SocketAddr, now_ms: i64) {
        self.clients.insert(client_id, addr);
        self.last_received.insert(client_id, now_ms);
    }

    /// Updates `client_id`'s last-received timestamp without changing its address.
    pub fn touch(&self, client_id: u32, now_ms: i64) {
        self.last_received.insert(client_id, now_ms);
    }

    /// Removes `client_id` from all three maps. Returns `true` if it had been registered.
    pub fn unregister(&self, client_id: u32) -> bool {
        self.required_clients.remove(&client_id);
        self.last_received.remove(&client_id);
        self.clients.remove(&client_id).is_some()
    }

    /// Marks `client_id` as required-but-not-ready.
    pub fn mark_required(&self, client_id: u32) {
        self.required_clients.insert(client_id);
    }

    /// The number of currently-registered clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether the registry currently has no registered clients.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Snapshots every `(client_id, addr)` pair currently registered, for fan-out iteration.
    pub fn snapshot(&self) -> Vec<(u32, SocketAddr)> {
        self.clients.iter().map(|e| (*e.key(), *e.value())).collect()
    }

    /// Returns every client ID whose `last_received` is older than `now_ms - timeout_threshold`.
    pub fn timed_out(&self, now_ms: i64, timeout_threshold: i64) -> Vec<u32> {
        self.last_received
            .iter()
            .filter(|e| now_ms - *e.value() > timeout_threshold)
            .map(|e| *e.key())
            .collect()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn register_and_lookup() {
        let r = ClientRegistry::new();
        r.register(7, addr(9000), 10);
        assert!(r.is_registered(7));
        assert_eq!(r.address_of(7), Some(addr(9000)));
        assert_eq!(r.last_received(7), Some(10));
    }

    #[test]
    fn unregister_clears_all_maps() {
        let r = ClientRegistry::new();
        r.mark_required(7);
        r.register(7, addr(9000), 10);
        assert!(r.unregister(7));
        assert!(!r.is_registered(7));
        assert_eq!(r.last_received(7), None);
        assert!(!r.unregister(7));
    }

    #[test]
    fn timed_out_reports_stale_clients_only() {
        let r = ClientRegistry::new();
        r.register(1, addr(1), 0);
        r.register(2, addr(2), 900);

        let stale = r.timed_out(1000, 500);
        assert_eq!(stale, vec![1]);
    }
}
