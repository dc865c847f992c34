use std::net::SocketAddr;

use crate::message::ReliableMode;

/// A single pipeline stage failed. Every fallible core operation reports one of these rather
/// than panicking; see the error handling table in the design notes for the disposition of each
/// variant.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The transport's `create_payload` hook returned `false`.
    #[error("failed to encode payload for message {msg_id}")]
    EncodingFailure {
        /// The message whose payload could not be produced.
        msg_id: u64,
    },

    /// A payload exceeded `maximum_udp_packet_size` and was split into parts.
    #[error("message {msg_id} ({size} bytes) was split into {part_count} parts")]
    Fragmented {
        /// The original (now stepped-back) message ID.
        msg_id: u64,
        /// The encoded payload size that triggered fragmentation.
        size: usize,
        /// The number of parts produced.
        part_count: usize,
    },

    /// A payload exceeded `maximum_udp_packet_size` and could not be split, either because
    /// auto-splitting is disabled or because the reliability mode forbids fragmentation.
    #[error("message {msg_id} ({size} bytes) exceeds the maximum packet size and cannot be split")]
    Unsplittable {
        /// The message that could not be sent.
        msg_id: u64,
        /// The encoded payload size.
        size: usize,
    },

    /// A send-side or receive-side processor returned `None`, discarding the message.
    #[error("message {msg_id:?} discarded by a {stage} processor")]
    ProcessorDiscard {
        /// The message ID, if one had been assigned yet.
        msg_id: Option<u64>,
        /// Which chain discarded the message (`"sender-pre"`, `"receiver-pre"`, etc).
        stage: &'static str,
    },

    /// A non-`ConnectRequest` message arrived from an address with no registry entry.
    #[error("message from unregistered sender {addr}")]
    UnknownSender {
        /// The sender's socket address.
        addr: SocketAddr,
    },

    /// A direct (non-broadcast) send targeted a `client_id` with no registry entry.
    #[error("direct send to unregistered client {client_id}")]
    UnknownReceiver {
        /// The unregistered client ID.
        client_id: u32,
    },

    /// `UdpTransport::start` returned `false`.
    #[error("transport failed to start")]
    LifecycleFailure,

    /// A reliability mode was asked to fragment when it cannot (caller error, not a protocol
    /// failure): UNRELIABLE messages are never fragmented by policy.
    #[error("reliable_mode {mode:?} cannot be fragmented")]
    UnfragmentableMode {
        /// The mode that rejected fragmentation.
        mode: ReliableMode,
    },
}

/// Convenience alias used throughout the core for fallible pipeline operations.
pub type Result<T> = std::result::Result<T, CoreError>;
