use std::collections::HashMap;
use std::sync::Arc;

use crate::config::State;
use crate::error::{CoreError, Result};
use crate::message::Message;

/// The external application collaborator that receives messages which aren't dispatched
/// instantly (see [`ReceivePipeline`]).
pub trait Receiver: Send + Sync {
    /// Delivers a message that was not claimed by the instant-dispatch table.
    fn receive(&self, message: Message);
}

impl<F> Receiver for F
where
    F: Fn(Message) + Send + Sync,
{
    fn receive(&self, message: Message) {
        self(message)
    }
}

/// A `Receiver` that drops everything; the default when no application receiver is configured.
pub struct NullReceiver;

impl Receiver for NullReceiver {
    fn receive(&self, _message: Message) {}
}

/// Runs a single received [`Message`] through: feature-resolve → pre-receive → dispatch
/// (instant vs external) → post-receive.
///
/// Protocol-level messages (acks, connect/leave, keep-alive) are handled by entries in the
/// instant-dispatch table, keyed by [`Message::class`], rather than by a handler embedded on the
/// message itself — this avoids reordering risk from queued application delivery and keeps the
/// table the single place that decides what counts as "protocol" versus "application" traffic.
pub struct ReceivePipeline {
    dispatch: HashMap<&'static str, Box<dyn Fn(Message) + Send + Sync>>,
    external: Arc<dyn Receiver>,
}

impl ReceivePipeline {
    /// Creates a pipeline that hands everything not in `dispatch` to `external`. Seeds a built-in
    /// no-op handler for `keep_alive`, since a `SequenceKeepAlive` heartbeat must never reach
    /// application code regardless of whether the peer is a client or a server — unlike
    /// `connect_request`/`leave_request`, which only a [`crate::server::Server`] wires up.
    pub fn new(external: Arc<dyn Receiver>) -> Self {
        let mut dispatch: HashMap<&'static str, Box<dyn Fn(Message) + Send + Sync>> = HashMap::new();
        dispatch.insert(
            "keep_alive",
            Box::new(|_m: Message| tracing::trace!("keep-alive received")),
        );
        Self { dispatch, external }
    }

    /// Registers an instant handler for messages of the given class (see [`Message::class`]).
    pub fn with_instant_handler(
        mut self,
        class: &'static str,
        handler: impl Fn(Message) + Send + Sync + 'static,
    ) -> Self {
        self.dispatch.insert(class, Box::new(handler));
        self
    }

    /// Drives `message` through the full receive pipeline.
    pub fn receive(&self, mut message: Message, state: &State) -> Result<()> {
        // 1. resolve
        message.resolve();

        // 2. before_receive
        let message = match state.chain.run_receiver_pre(message) {
            Some(m) => m,
            None => {
                tracing::trace!("message discarded by receiver-pre chain");
                return Err(CoreError::ProcessorDiscard {
                    msg_id: None,
                    stage: "receiver-pre",
                });
            }
        };

        // 3. dispatch
        let class = message.class();
        if message.flags.is_instant_processable || message.flags.is_instant_server_processable {
            if let Some(handler) = self.dispatch.get(class) {
                handler(message.clone());
                return self.post_receive(message, state);
            }
        }
        self.external.receive(message.clone());

        // 4. after_receive
        self.post_receive(message, state)
    }

    fn post_receive(&self, message: Message, state: &State) -> Result<()> {
        match state.chain.run_receiver_post(message) {
            Some(_) => Ok(()),
            None => {
                tracing::trace!("message discarded by receiver-post chain");
                Err(CoreError::ProcessorDiscard {
                    msg_id: None,
                    stage: "receiver-post",
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ReliableMode;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    fn state() -> State {
        State::default()
    }

    #[test]
    fn application_message_reaches_external_receiver() {
        let received = Arc::new(Mutex::new(None));
        let received_clone = received.clone();
        let pipeline = ReceivePipeline::new(Arc::new(move |m: Message| {
            *received_clone.lock().unwrap() = Some(m.msg_id);
        }));

        let mut m = Message::new(Box::new([1]), ReliableMode::Unreliable);
        m.msg_id = 77;

        pipeline.receive(m, &state()).unwrap();
        assert_eq!(*received.lock().unwrap(), Some(77));
    }

    #[test]
    fn keep_alive_never_reaches_external_receiver() {
        let external_called = Arc::new(AtomicBool::new(false));
        let external_clone = external_called.clone();

        let pipeline = ReceivePipeline::new(Arc::new(move |_m: Message| {
            external_clone.store(true, Ordering::SeqCst);
        }));

        pipeline.receive(Message::keep_alive(), &state()).unwrap();
        assert!(!external_called.load(Ordering::SeqCst));
    }

    #[test]
    fn instant_message_skips_external_receiver() {
        let external_called = Arc::new(AtomicBool::new(false));
        let instant_called = Arc::new(AtomicBool::new(false));

        let external_clone = external_called.clone();
        let instant_clone = instant_called.clone();

        let pipeline = ReceivePipeline::new(Arc::new(move |_m: Message| {
            external_clone.store(true, Ordering::SeqCst);
        }))
        .with_instant_handler("connect_request", move |_m: Message| {
            instant_clone.store(true, Ordering::SeqCst);
        });

        let m = Message::connect_request(5);
        pipeline.receive(m, &state()).unwrap();

        assert!(instant_called.load(Ordering::SeqCst));
        assert!(!external_called.load(Ordering::SeqCst));
    }

    #[test]
    fn receiver_pre_discard_skips_dispatch() {
        let chain = Arc::new(
            crate::processor::ProcessorChain::new().with_receiver_pre(|_m: Message| None),
        );
        let state = State::new(
            Arc::new(crate::clock::SystemClock::new()),
            Arc::new(crate::id_provider::SharedIdProvider::new()),
            chain,
        );

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();
        let pipeline = ReceivePipeline::new(Arc::new(move |_m: Message| {
            called_clone.store(true, Ordering::SeqCst);
        }));

        let m = Message::new(Box::new([1]), ReliableMode::Unreliable);
        let err = pipeline.receive(m, &state).unwrap_err();

        assert!(matches!(err, CoreError::ProcessorDiscard { .. }));
        assert!(!called.load(Ordering::SeqCst));
    }
}
