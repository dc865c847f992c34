//! A reliable, ordered, multi-client messaging layer over UDP.
//!
//! The core is transport-agnostic and encoding-agnostic: a [`UdpTransport`] owns the socket and
//! the wire format, an [`IdProvider`] owns sequencing, a [`ProcessorChain`] owns everything that
//! can be expressed as "transform or discard a message in flight" (acks, congestion control,
//! logging), and a [`PeerController`] wires those collaborators into a paced send queue and a
//! `start`/`process`/`stop` lifecycle. [`Server`](server::Server) composes a `PeerController`
//! with a client registry to add liveness tracking, keep-alive, and broadcast fan-out, without
//! subclassing it.

pub mod clock;
pub mod config;
pub mod error;
pub mod fragmenter;
pub mod hooks;
pub mod id_provider;
pub mod message;
pub mod peer_controller;
pub mod pipeline;
pub mod processor;
pub mod server;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, State};
pub use error::{CoreError, Result};
pub use fragmenter::Fragmenter;
pub use hooks::{ServerHooks, TracingServerHooks};
pub use id_provider::{IdProvider, PerStreamIdProvider, SharedIdProvider};
pub use message::{
    AckMessage, ControlKind, Message, MessageFlags, MessagePart, ReliableMode, SequenceKeepAlive,
    PART_HEADER_SIZE,
};
pub use peer_controller::PeerController;
pub use pipeline::{NullReceiver, Receiver, ReceivePipeline, SendPipeline};
pub use processor::{Periodic, Processor, ProcessorChain};
pub use server::{ClientRegistry, Server};
pub use transport::{UdpSocketTransport, UdpTransport};
