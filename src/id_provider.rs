use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::message::Message;

/// Assigns monotonic per-stream message IDs, and supports stepping an issued ID back when a
/// message is replaced by fragments instead of being sent as-is.
///
/// `step_back` must be exact: if the next-issued ID was `n`, after `step_back` the next call to
/// `next_id` on the same stream must return `n` again. Implementations live entirely on the
/// single processing thread that drives [`crate::peer_controller::PeerController::process`], so
/// no internal synchronization beyond what's needed for the server's direct-send path is
/// required.
pub trait IdProvider: Send + Sync {
    /// Returns the next monotonic ID for the stream this message belongs to, and records it as
    /// issued.
    fn next_id(&self, message: &Message) -> u64;

    /// Returns the most recently issued ID for this message's stream back to the pool, so the
    /// next `next_id` call reissues it.
    fn step_back(&self, message: &Message);

    /// Whether the server must assign a fresh ID per recipient during broadcast fan-out (`true`,
    /// "per-client IDs") or reuse one ID for every recipient (`false`, "shared ID").
    fn resolve_every_client_message(&self) -> bool;
}

/// A single monotonic counter shared by every stream. Used for the "shared ID" broadcast mode,
/// and as the default provider for a plain (non-server) peer.
pub struct SharedIdProvider {
    next: AtomicU64,
    last_issued: AtomicU64,
}

impl SharedIdProvider {
    /// Creates a provider whose first issued ID is 1 (0 remains reserved for "unassigned").
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            last_issued: AtomicU64::new(0),
        }
    }
}

impl Default for SharedIdProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdProvider for SharedIdProvider {
    fn next_id(&self, _message: &Message) -> u64 {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        self.last_issued.store(id, Ordering::SeqCst);
        id
    }

    fn step_back(&self, _message: &Message) {
        let last = self.last_issued.load(Ordering::SeqCst);
        if last != 0 {
            self.next.store(last, Ordering::SeqCst);
        }
    }

    fn resolve_every_client_message(&self) -> bool {
        false
    }
}

/// Assigns a distinct monotonic counter per reliability-stream class (see [`Message::class`]),
/// and a fresh ID per recipient during server broadcast fan-out ("per-client IDs" mode).
pub struct PerStreamIdProvider {
    counters: std::sync::Mutex<HashMap<&'static str, (u64, u64)>>,
}

impl PerStreamIdProvider {
    /// Creates a provider with no streams registered yet; each stream starts issuing from 1.
    pub fn new() -> Self {
        Self {
            counters: std::sync::Mutex::new(HashMap::new()),
        }
    }
}

impl Default for PerStreamIdProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdProvider for PerStreamIdProvider {
    fn next_id(&self, message: &Message) -> u64 {
        let mut counters = self.counters.lock().unwrap();
        let entry = counters.entry(message.class()).or_insert((1, 0));
        let id = entry.0;
        entry.1 = id;
        entry.0 += 1;
        id
    }

    fn step_back(&self, message: &Message) {
        let mut counters = self.counters.lock().unwrap();
        if let Some(entry) = counters.get_mut(message.class()) {
            if entry.1 != 0 {
                entry.0 = entry.1;
            }
        }
    }

    fn resolve_every_client_message(&self) -> bool {
        true
    }
}
