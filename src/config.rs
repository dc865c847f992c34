use std::collections::HashSet;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::hooks::{ServerHooks, TracingServerHooks};
use crate::id_provider::{IdProvider, SharedIdProvider};
use crate::processor::{Periodic, ProcessorChain};

/// The documented, validated set of tunables recognized by the core. Plain data, `Clone`-able,
/// with a defaulted constructor and an `is_valid` predicate checked once at
/// `PeerController::start`/`Server::bind`, mirroring how endpoint configuration is structured
/// elsewhere in this crate's lineage.
#[derive(Clone, Debug)]
pub struct Config {
    /// Hard cap on a single datagram payload, in bytes.
    pub maximum_udp_packet_size: usize,
    /// Whether the [`Fragmenter`](crate::fragmenter::Fragmenter) runs automatically when a
    /// payload exceeds `maximum_udp_packet_size`.
    pub auto_split_too_big_messages: bool,
    /// Minimum gap, in milliseconds, between paced queue dequeues.
    pub queued_messages_delay: i64,
    /// Server heartbeat cadence, in milliseconds.
    pub keep_alive_interval: i64,
    /// Silent-client timeout, in milliseconds.
    pub timeout_threshold: i64,
    /// Dedup window, in milliseconds, for `ConnectRequest`s from the same client.
    pub time_since_last_connect_request: i64,
    /// Allowlist of client IDs; empty means "accept any".
    pub expected_client_ids: HashSet<u32>,
    /// Marks a peer as a server (client registry, broadcast fan-out, keep-alive pulse all
    /// activate).
    pub host: bool,
}

impl Config {
    /// Returns `true` if every field holds a sane value.
    pub fn is_valid(&self) -> bool {
        self.maximum_udp_packet_size > crate::message::PART_HEADER_SIZE
            && self.queued_messages_delay >= 0
            && self.keep_alive_interval > 0
            && self.timeout_threshold > 0
            && self.time_since_last_connect_request >= 0
    }
}

impl Default for Config {
    /// Defaults: 1200-byte packet ceiling, auto-split enabled, 10ms pacing, 5s keep-alive, 20s
    /// timeout, 1s connect-request dedup window, no client allowlist, not a host.
    fn default() -> Self {
        Self {
            maximum_udp_packet_size: 1200,
            auto_split_too_big_messages: true,
            queued_messages_delay: 10,
            keep_alive_interval: 5_000,
            timeout_threshold: 20_000,
            time_since_last_connect_request: 1_000,
            expected_client_ids: HashSet::new(),
            host: false,
        }
    }
}

/// The dependency bag every pipeline stage draws its collaborators from: the clock, the ID
/// provider, the processor chain, any periodic processors, and the server-hook callback.
///
/// Deliberately *not* held by [`Config`] and does *not* hold a back-reference to the owning
/// [`PeerController`](crate::peer_controller::PeerController) — the original design's cyclic
/// `Config` ↔ controller reference is resolved here by having callers pass the controller into
/// whatever needs it, rather than State owning it.
pub struct State {
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) id_provider: Arc<dyn IdProvider>,
    pub(crate) chain: Arc<ProcessorChain>,
    pub(crate) periodics: Vec<Arc<dyn Periodic>>,
    pub(crate) server_hooks: Arc<dyn ServerHooks>,
}

impl State {
    /// Creates a state bag with the given collaborators.
    pub fn new(
        clock: Arc<dyn Clock>,
        id_provider: Arc<dyn IdProvider>,
        chain: Arc<ProcessorChain>,
    ) -> Self {
        Self {
            clock,
            id_provider,
            chain,
            periodics: Vec::new(),
            server_hooks: Arc::new(TracingServerHooks),
        }
    }

    /// Registers a periodic processor, ticked once per `process()` call.
    pub fn with_periodic(mut self, p: Arc<dyn Periodic>) -> Self {
        self.periodics.push(p);
        self
    }

    /// Overrides the server-hook callback (defaults to a tracing-only implementation).
    pub fn with_server_hooks(mut self, hooks: Arc<dyn ServerHooks>) -> Self {
        self.server_hooks = hooks;
        self
    }
}

impl Default for State {
    /// A state bag suitable for a plain (non-server) peer: system clock, a single shared ID
    /// stream, and an empty processor chain.
    fn default() -> Self {
        Self::new(
            Arc::new(SystemClock::new()),
            Arc::new(SharedIdProvider::new()),
            Arc::new(ProcessorChain::new()),
        )
    }
}
