//! Shared scaffolding for the end-to-end scenario tests: a scripted, in-memory [`UdpTransport`]
//! and a [`ServerHooks`] spy, both driven through cloneable handles so the test body keeps
//! control after the transport/hooks are boxed into a `Server`/`PeerController`.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use relaynet::{Message, ServerHooks, UdpTransport};

#[derive(Clone, Default)]
pub struct Outbox(Arc<Mutex<Vec<(SocketAddr, Message)>>>);

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(SocketAddr, Message)> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn to(&self, addr: SocketAddr) -> Vec<Message> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct Inbox(Arc<Mutex<VecDeque<(Message, SocketAddr)>>>);

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message: Message, from: SocketAddr) {
        self.0.lock().unwrap().push_back((message, from));
    }
}

pub struct ScriptedTransport {
    outbox: Outbox,
    inbox: Inbox,
}

impl ScriptedTransport {
    pub fn new(outbox: Outbox, inbox: Inbox) -> Self {
        Self { outbox, inbox }
    }
}

impl UdpTransport for ScriptedTransport {
    fn start(&mut self) -> bool {
        true
    }

    fn stop(&mut self) {}

    fn process(&mut self) {}

    fn send(&mut self, message: &Message) {
        if let Some(addr) = message.socket_address_recipient {
            self.outbox.0.lock().unwrap().push((addr, message.clone()));
        }
    }

    fn create_payload(&mut self, message: &mut Message) -> bool {
        message.payload = message.body.to_vec();
        true
    }

    fn receive_pending(&mut self) -> Vec<(Message, SocketAddr)> {
        self.inbox.0.lock().unwrap().drain(..).collect()
    }
}

/// Counts `ServerHooks` calls so scenario tests can assert registration transitions without
/// reaching into the registry's private state.
#[derive(Clone, Default)]
pub struct CountingHooks {
    registers: Arc<AtomicU32>,
    unregisters: Arc<AtomicU32>,
}

impl CountingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registers(&self) -> u32 {
        self.registers.load(Ordering::SeqCst)
    }

    pub fn unregisters(&self) -> u32 {
        self.unregisters.load(Ordering::SeqCst)
    }
}

impl ServerHooks for CountingHooks {
    fn on_register(&self, _client_id: u32) {
        self.registers.fetch_add(1, Ordering::SeqCst);
    }

    fn on_unregister(&self, _client_id: u32) {
        self.unregisters.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Installs a `tracing` subscriber so scenario tests can inspect span/event output with
/// `RUST_LOG`; safe to call from every test since `try_init` is a no-op after the first call.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
