//! The server extension: client registry, liveness tracking, keep-alive, and broadcast fan-out,
//! built atop a [`PeerController`] via composition rather than inheritance.

mod registry;

pub use registry::ClientRegistry;

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::config::{Config, State};
use crate::error::{CoreError, Result};
use crate::message::Message;
use crate::peer_controller::PeerController;
use crate::pipeline::{ReceivePipeline, Receiver};
use crate::transport::UdpTransport;

#[derive(Default)]
struct Counters {
    incoming: HashMap<&'static str, u64>,
    outgoing: HashMap<&'static str, u64>,
}

/// Forwards messages to the real application [`Receiver`], enforcing the unknown-sender policy
/// and refreshing liveness on the way in, and separately queues any message whose `broadcast()`
/// flag is set so `Server::process` can re-fan it out with full `&mut` access to the registry,
/// ID provider, and transport. This indirection exists because the receive pipeline only ever
/// hands a `Receiver` a shared `&self`, while fan-out needs to mutate server-owned state — the
/// same "funnel delivery through an inbox the processing thread later drains" shape the registry
/// uses for its own concurrency.
struct ServerReceiver {
    inner: Arc<dyn Receiver>,
    registry: Arc<ClientRegistry>,
    clock: Arc<dyn Clock>,
    counters: Arc<Mutex<Counters>>,
    pending_broadcasts: Arc<Mutex<VecDeque<Message>>>,
}

impl Receiver for ServerReceiver {
    fn receive(&self, message: Message) {
        let known = message
            .socket_address_recipient
            .map(|addr| self.registry.is_known_address(&addr))
            .unwrap_or(false);

        if !known {
            match message.socket_address_recipient {
                Some(addr) => {
                    let err = CoreError::UnknownSender { addr };
                    tracing::warn!(sender_id = message.sender_id, "{err}");
                }
                None => {
                    tracing::warn!(sender_id = message.sender_id, "dropping message with no sender address");
                }
            }
            return;
        }

        if message.sender_id != 0 {
            self.registry.touch(message.sender_id, self.clock.now());
        }

        bump(&self.counters, message.class(), true, message.flags.is_resend);

        if message.broadcast() {
            self.pending_broadcasts.lock().unwrap().push_back(message.clone());
        }
        self.inner.receive(message);
    }
}

fn bump(counters: &Mutex<Counters>, class: &'static str, incoming: bool, is_resend: bool) {
    let mut c = counters.lock().unwrap();
    if incoming {
        *c.incoming.entry(class).or_insert(0) += 1;
    } else if !is_resend {
        *c.outgoing.entry(class).or_insert(0) += 1;
    }
}

/// The server multiplexer: a [`PeerController`] plus a client registry, keep-alive pulse, and
/// broadcast fan-out logic.
pub struct Server {
    controller: PeerController,
    registry: Arc<ClientRegistry>,
    pending_broadcasts: Arc<Mutex<VecDeque<Message>>>,
    counters: Arc<Mutex<Counters>>,
    last_keepalive_check: i64,
    /// The server's own synthetic ID, used only for its own `LeaveRequest` at shutdown.
    server_id: u32,
}

impl Server {
    /// Builds a server from its configuration and dependency bag, wiring the registration
    /// handshake into the underlying controller's receive pipeline. `application_receiver`
    /// receives every non-control message (in addition to any re-fan-out triggered by
    /// `broadcast()`). Does not open the transport; call [`start`](Self::start) for that.
    pub fn new(
        config: Config,
        state: State,
        transport: Box<dyn UdpTransport>,
        application_receiver: Arc<dyn Receiver>,
    ) -> Self {
        assert!(config.host, "Server::new requires Config::host = true");

        let registry = Arc::new(ClientRegistry::new());
        let pending_broadcasts = Arc::new(Mutex::new(VecDeque::new()));
        let counters = Arc::new(Mutex::new(Counters::default()));

        let receiver = Arc::new(ServerReceiver {
            inner: application_receiver,
            registry: registry.clone(),
            clock: state.clock.clone(),
            counters: counters.clone(),
            pending_broadcasts: pending_broadcasts.clone(),
        });

        let receive_pipeline =
            build_receive_pipeline(&config, &state, registry.clone(), counters.clone(), receiver);

        let controller = PeerController::new(config, state, transport, receive_pipeline);

        Self {
            controller,
            registry,
            pending_broadcasts,
            counters,
            last_keepalive_check: 0,
            server_id: 0,
        }
    }

    /// Opens the transport.
    pub fn start(&mut self) -> Result<()> {
        self.controller.start()?;
        self.last_keepalive_check = self.controller.state().clock.now();
        Ok(())
    }

    /// Sends a `LeaveRequest` on behalf of the server's own ID, then closes the transport.
    pub fn stop(&mut self) {
        self.controller.stop(self.server_id);
    }

    /// Read access to the client registry.
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Drives one `process()` tick: liveness eviction, the underlying controller's pacing/I/O
    /// tick, pending broadcast re-fan-out, then the keep-alive pulse.
    pub fn process(&mut self) {
        let now_ms = self.controller.state().clock.now();
        self.evict_timed_out(now_ms);
        self.controller.process();
        self.drain_pending_broadcasts();
        self.maybe_send_keepalive(now_ms);
    }

    fn evict_timed_out(&mut self, now_ms: i64) {
        let timeout_threshold = self.controller.config().timeout_threshold;
        for client_id in self.registry.timed_out(now_ms, timeout_threshold) {
            if self.registry.unregister(client_id) {
                self.controller.state().server_hooks.on_unregister(client_id);
                tracing::info!(client_id, "client timed out");
            }
        }
    }

    fn maybe_send_keepalive(&mut self, now_ms: i64) {
        if self.registry.is_empty() {
            return;
        }
        let interval = self.controller.config().keep_alive_interval;
        if now_ms - self.last_keepalive_check <= interval {
            return;
        }

        let keepalive = Message::keep_alive();
        if self.broadcast(keepalive, 0, false).is_ok() {
            self.last_keepalive_check = now_ms;
        }
    }

    fn drain_pending_broadcasts(&mut self) {
        let pending: Vec<Message> = {
            let mut guard = self.pending_broadcasts.lock().unwrap();
            guard.drain(..).collect()
        };
        for mut message in pending {
            let except_id = message.sender_id;
            let include_sender = message.send_broadcast_back_to_sender();
            message.clear_id();
            message.receiver_id = 0;
            let _ = self.broadcast(message, except_id, include_sender);
        }
    }

    /// Unified send entry point: the extension point `Server` overrides over a plain
    /// [`PeerController`]. Routes to [`send_direct`](Self::send_direct) when `receiver_id > 0`,
    /// otherwise to [`broadcast`](Self::broadcast) with no recipient excluded.
    pub fn send(&mut self, message: Message) -> Result<()> {
        if message.receiver_id > 0 {
            let client_id = message.receiver_id;
            self.send_direct(message, client_id)
        } else {
            self.broadcast(message, 0, false)
        }
    }

    /// Sends `message` to exactly one registered client, bypassing fan-out. Fails with
    /// [`CoreError::UnknownReceiver`] if `client_id` isn't registered.
    pub fn send_direct(&mut self, mut message: Message, client_id: u32) -> Result<()> {
        let addr = self
            .registry
            .address_of(client_id)
            .ok_or(CoreError::UnknownReceiver { client_id })?;
        message.receiver_id = client_id;
        message.socket_address_recipient = Some(addr);
        bump(&self.counters, message.class(), false, message.flags.is_resend);
        self.controller.send_immediate(message, false)
    }

    /// Fans `message` out to registered clients. `except_id` (if nonzero) is excluded unless
    /// `include_sender` is set. Uses per-client-ID mode (a fresh `msg_id` and independent
    /// `create_payload`/`before_send`/`after_send` per recipient) or shared-ID mode (one `msg_id`,
    /// one encode, one `before_send`/`after_send`), as selected by the configured `IdProvider`.
    pub fn broadcast(&mut self, message: Message, except_id: u32, include_sender: bool) -> Result<()> {
        let per_client_ids = self.controller.state().id_provider.resolve_every_client_message();
        let targets: Vec<(u32, SocketAddr)> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|(id, _)| include_sender || except_id == 0 || *id != except_id)
            .collect();

        if targets.is_empty() {
            return Ok(());
        }

        let class = message.class();
        let is_resend = message.flags.is_resend;

        if per_client_ids {
            for (client_id, addr) in targets {
                let mut m = message.clone();
                m.clear_id();
                m.receiver_id = client_id;
                m.socket_address_recipient = Some(addr);
                self.controller.send_immediate(m, false)?;
                bump(&self.counters, class, false, is_resend);
            }
            Ok(())
        } else {
            self.broadcast_shared(message, targets, class, is_resend)
        }
    }

    fn broadcast_shared(
        &mut self,
        mut message: Message,
        targets: Vec<(u32, SocketAddr)>,
        class: &'static str,
        is_resend: bool,
    ) -> Result<()> {
        message.resolve();
        message.prepare_to_send();
        if message.msg_id == 0 {
            message.msg_id = self.controller.state().id_provider.next_id(&message);
        }

        if !self.controller.transport_mut().create_payload(&mut message) {
            return Err(CoreError::EncodingFailure { msg_id: message.msg_id });
        }

        let mut message = match self.controller.state().chain.run_sender_pre(message) {
            Some(m) => m,
            None => {
                return Err(CoreError::ProcessorDiscard {
                    msg_id: None,
                    stage: "sender-pre",
                })
            }
        };

        for (client_id, addr) in targets {
            message.receiver_id = client_id;
            message.socket_address_recipient = Some(addr);
            self.controller.transport_mut().send(&message);
            bump(&self.counters, class, false, is_resend);
        }

        message.receiver_id = 0;
        match self.controller.state().chain.run_sender_post(message) {
            Some(_) => Ok(()),
            None => Err(CoreError::ProcessorDiscard {
                msg_id: None,
                stage: "sender-post",
            }),
        }
    }

    /// The current outgoing count for a message class (non-resend sends only).
    pub fn outgoing_count(&self, class: &str) -> u64 {
        self.counters.lock().unwrap().outgoing.get(class).copied().unwrap_or(0)
    }

    /// The current incoming count for a message class.
    pub fn incoming_count(&self, class: &str) -> u64 {
        self.counters.lock().unwrap().incoming.get(class).copied().unwrap_or(0)
    }
}

fn build_receive_pipeline(
    config: &Config,
    state: &State,
    registry: Arc<ClientRegistry>,
    counters: Arc<Mutex<Counters>>,
    receiver: Arc<ServerReceiver>,
) -> ReceivePipeline {
    let clock = state.clock.clone();
    let hooks = state.server_hooks.clone();
    let expected_client_ids = config.expected_client_ids.clone();
    let time_since_last_connect_request = config.time_since_last_connect_request;

    let connect_registry = registry.clone();
    let connect_hooks = hooks.clone();
    let connect_counters = counters.clone();
    let connect_handler = move |message: Message| {
        bump(&connect_counters, "connect_request", true, false);

        let client_id = message.sender_id;
        let now_ms = clock.now();
        let dedup_ok = match connect_registry.last_received(client_id) {
            Some(last) => now_ms - last > time_since_last_connect_request,
            None => true,
        };
        if !dedup_ok {
            return;
        }

        if connect_registry.is_registered(client_id) {
            connect_registry.unregister(client_id);
            connect_hooks.on_unregister(client_id);
        }

        if !expected_client_ids.is_empty() && !expected_client_ids.contains(&client_id) {
            tracing::warn!(client_id, "connect request from client outside the allowlist");
            return;
        }
        connect_registry.mark_required(client_id);

        if let Some(addr) = message.socket_address_recipient {
            connect_registry.register(client_id, addr, now_ms);
            connect_hooks.on_register(client_id);
        }
    };

    let leave_registry = registry.clone();
    let leave_hooks = hooks.clone();
    let leave_counters = counters.clone();
    let leave_handler = move |message: Message| {
        bump(&leave_counters, "leave_request", true, false);
        if leave_registry.unregister(message.sender_id) {
            leave_hooks.on_unregister(message.sender_id);
        }
    };

    ReceivePipeline::new(receiver)
        .with_instant_handler("connect_request", connect_handler)
        .with_instant_handler("leave_request", leave_handler)
}
