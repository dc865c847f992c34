use std::collections::VecDeque;

use crate::config::{Config, State};
use crate::error::{CoreError, Result};
use crate::message::Message;
use crate::pipeline::{ReceivePipeline, SendPipeline};
use crate::transport::UdpTransport;

/// Owns the send/receive pipelines, the paced outbound queue, and the peer's lifecycle
/// (`start`/`process`/`stop`). A [`crate::server::Server`] is built on top of one of these via
/// composition rather than inheritance: it holds a `PeerController` and drives its `process()`
/// loop, while intercepting `send`/`receive` at the points where registry and fan-out logic need
/// to run.
pub struct PeerController {
    config: Config,
    state: State,
    transport: Box<dyn UdpTransport>,
    receive_pipeline: ReceivePipeline,
    send_pipeline: SendPipeline,

    queue: VecDeque<Message>,
    queue_delay_inc: i64,
    last_tick_ms: i64,

    connected: bool,
}

impl PeerController {
    /// Creates a controller from its configuration and dependency bag. Does not open the
    /// transport; call [`start`](Self::start) for that.
    pub fn new(
        config: Config,
        state: State,
        transport: Box<dyn UdpTransport>,
        receive_pipeline: ReceivePipeline,
    ) -> Self {
        let send_pipeline = SendPipeline::new(&config);
        Self {
            config,
            state,
            transport,
            receive_pipeline,
            send_pipeline,
            queue: VecDeque::new(),
            queue_delay_inc: 0,
            last_tick_ms: 0,
            connected: false,
        }
    }

    /// Opens the transport. Returns [`CoreError::LifecycleFailure`] (and leaves `connected`
    /// false) if the config is invalid or the transport failed to start.
    pub fn start(&mut self) -> Result<()> {
        if !self.config.is_valid() {
            tracing::error!("refusing to start with an invalid config");
            return Err(CoreError::LifecycleFailure);
        }
        self.last_tick_ms = self.state.clock.now();
        self.connected = self.transport.start();
        if !self.connected {
            tracing::error!("{}", CoreError::LifecycleFailure);
            return Err(CoreError::LifecycleFailure);
        }
        Ok(())
    }

    /// Sends a `LeaveRequest`, then closes the transport. Any messages still in the outbound
    /// queue are discarded.
    pub fn stop(&mut self, sender_id: u32) {
        if self.connected {
            let mut leave = Message::leave_request(sender_id);
            leave.socket_address_recipient = self.queue.front().and_then(|m| m.socket_address_recipient);
            let _ = self.send_pipeline.send(
                leave,
                &self.config,
                &self.state,
                self.transport.as_mut(),
                &mut VecDeque::new(),
                false,
            );
        }
        self.queue.clear();
        self.transport.stop();
        self.connected = false;
    }

    /// Enqueues `message` for paced release; does not send immediately. Application code and the
    /// [`crate::fragmenter::Fragmenter`] both go through this path, keeping transmission strictly
    /// FIFO.
    pub fn enqueue(&mut self, message: Message) {
        self.queue.push_back(message);
    }

    /// Runs the send pipeline on `message` immediately, bypassing the pacing queue. Used for
    /// operations that must complete atomically across multiple recipients within a single call
    /// (server broadcast fan-out, keep-alive) rather than being subject to the one-per-tick
    /// pacing rule.
    pub fn send_immediate(&mut self, message: Message, is_part: bool) -> Result<()> {
        self.send_pipeline.send(
            message,
            &self.config,
            &self.state,
            self.transport.as_mut(),
            &mut self.queue,
            is_part,
        )
    }

    /// Drives one `process()` tick: accumulates pacing delay, releases at most one queued
    /// message, ticks periodic processors, and drives the transport's own I/O, then dispatches
    /// any datagrams the transport received through the receive pipeline.
    pub fn process(&mut self) {
        let now_ms = self.state.clock.now();
        let elapsed = now_ms - self.last_tick_ms;
        self.last_tick_ms = now_ms;
        self.queue_delay_inc += elapsed;

        if self.queue_delay_inc > self.config.queued_messages_delay {
            if let Some(message) = self.queue.pop_front() {
                let is_part = message.flags.is_part;
                if let Err(e) = self.send_immediate(message, is_part) {
                    tracing::trace!("queued send did not complete: {e}");
                }
                self.queue_delay_inc = 0;
            }
        }

        for periodic in &self.state.periodics {
            periodic.tick(now_ms);
        }

        self.transport.process();

        for (message, addr) in self.transport.receive_pending() {
            let mut message = message;
            message.socket_address_recipient = Some(addr);
            if let Err(e) = self.receive_pipeline.receive(message, &self.state) {
                tracing::trace!("received message did not complete pipeline: {e}");
            }
        }
    }

    /// Whether the transport is currently started.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The number of messages currently waiting in the outbound queue.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Read-only access to the configuration this controller was started with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read-only access to the dependency bag.
    pub fn state(&self) -> &State {
        &self.state
    }

    pub(crate) fn transport_mut(&mut self) -> &mut dyn UdpTransport {
        self.transport.as_mut()
    }
}
