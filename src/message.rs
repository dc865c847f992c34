use std::net::SocketAddr;

/// The delivery guarantee a [`Message`] is sent with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReliableMode {
    /// Fire-and-forget; never retransmitted, never acked.
    Unreliable,
    /// Ordered by `msg_id`; the receiver drops anything older than the last delivered ID on the
    /// same stream, but the sender never retransmits.
    SequenceNumber,
    /// Retransmitted by a processor until the receiver's ack batch includes this `msg_id`.
    AckPacket,
}

/// A lazily-resolved, opaque-to-the-core bundle of per-message features (compression,
/// encryption, ...). The core only ever calls [`Features::resolve`] once per message.
#[derive(Clone, Debug, Default)]
pub struct Features {
    resolved: bool,
}

impl Features {
    /// Resolves the feature set exactly once; subsequent calls are no-ops.
    pub fn resolve(&mut self) {
        self.resolved = true;
    }

    /// Whether [`resolve`](Self::resolve) has already run.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }
}

/// Per-message behavior flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessageFlags {
    /// Set when a processor is retransmitting a message that was already sent once.
    pub is_resend: bool,
    /// Set when the message should be fanned out to every registered client.
    pub broadcast: bool,
    /// When `broadcast` is set, whether the fan-out should also deliver back to the original
    /// sender.
    pub send_broadcast_back_to_sender: bool,
    /// Set when the message carries its own handler and should be dispatched synchronously on
    /// the pipeline thread rather than handed to the external application receiver.
    pub is_instant_processable: bool,
    /// Set when this message is a [`MessagePart`] wrapped back into a generic `Message` for
    /// re-entry into the paced send queue; the size-check stage must never fragment it again.
    pub is_part: bool,
    /// Like `is_instant_processable`, but specific to server-side instant dispatch (e.g.
    /// `ConnectRequest`/`LeaveRequest`).
    pub is_instant_server_processable: bool,
}

/// The kind of control message a [`Message`] carries, when it isn't a plain application payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlKind {
    /// A client announcing itself to a server.
    ConnectRequest,
    /// A peer announcing its intent to disconnect.
    LeaveRequest,
    /// An idle-stream heartbeat; carries the marker payload so the receive pipeline can route it
    /// through the instant-dispatch table instead of the external application receiver.
    KeepAlive(SequenceKeepAlive),
}

/// The universal unit of the messaging layer.
///
/// A `Message` moves through [`crate::pipeline::SendPipeline`] or
/// [`crate::pipeline::ReceivePipeline`] exactly once per send/receive attempt; its `msg_id` is
/// assigned on first send (see [`Message::resolve_id`]) and its payload is produced by the
/// transport's encoding hook, never by the core itself.
#[derive(Clone, Debug)]
pub struct Message {
    /// 0 until the first send attempt assigns one via an [`IdProvider`](crate::id_provider::IdProvider).
    pub msg_id: u64,
    /// 0 means broadcast on server send, or unresolved on receive.
    pub sender_id: u32,
    /// 0 means broadcast on server send, or unresolved on receive.
    pub receiver_id: u32,
    /// Raw application payload, prior to transport encoding.
    pub body: Box<[u8]>,
    /// Populated by the transport's `create_payload` hook during the send pipeline.
    pub payload: Vec<u8>,
    /// Delivery guarantee.
    pub reliable_mode: ReliableMode,
    /// Lazily-resolved feature descriptor set.
    pub features: Features,
    /// Set just before transmit.
    pub socket_address_recipient: Option<SocketAddr>,
    /// Behavior flags.
    pub flags: MessageFlags,
    /// `Some` if this message is a protocol control message.
    pub control: Option<ControlKind>,
    prepared: bool,
}

impl Message {
    /// Creates a new, unsent application message.
    pub fn new(body: Box<[u8]>, reliable_mode: ReliableMode) -> Self {
        Self {
            msg_id: 0,
            sender_id: 0,
            receiver_id: 0,
            body,
            payload: Vec::new(),
            reliable_mode,
            features: Features::default(),
            socket_address_recipient: None,
            flags: MessageFlags::default(),
            control: None,
            prepared: false,
        }
    }

    /// Creates a `ConnectRequest` control message, always instant-processable.
    pub fn connect_request(sender_id: u32) -> Self {
        let mut m = Self::new(Box::new([]), ReliableMode::Unreliable);
        m.sender_id = sender_id;
        m.control = Some(ControlKind::ConnectRequest);
        m.flags.is_instant_processable = true;
        m.flags.is_instant_server_processable = true;
        m
    }

    /// Creates a `LeaveRequest` control message, always instant-processable.
    pub fn leave_request(sender_id: u32) -> Self {
        let mut m = Self::new(Box::new([]), ReliableMode::Unreliable);
        m.sender_id = sender_id;
        m.control = Some(ControlKind::LeaveRequest);
        m.flags.is_instant_processable = true;
        m.flags.is_instant_server_processable = true;
        m
    }

    /// Creates a `SequenceKeepAlive` heartbeat, always instant-processable so it never reaches
    /// the external application receiver (see [`crate::pipeline::ReceivePipeline`]'s built-in
    /// `keep_alive` dispatch entry).
    pub fn keep_alive() -> Self {
        let mut m = Self::new(Box::new([]), ReliableMode::SequenceNumber);
        m.control = Some(ControlKind::KeepAlive(SequenceKeepAlive));
        m.flags.is_instant_processable = true;
        m
    }

    /// Resolves the message's feature set. Idempotent per the data model's lifecycle contract,
    /// but the pipeline only ever calls this once.
    pub fn resolve(&mut self) {
        self.features.resolve();
    }

    /// Marks the message as having entered the send pipeline; idempotent.
    pub fn prepare_to_send(&mut self) {
        self.prepared = true;
    }

    /// Whether `prepare_to_send` has run yet.
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Clears the assigned ID, used before a broadcast re-fan-out so a fresh ID is issued.
    pub fn clear_id(&mut self) {
        self.msg_id = 0;
    }

    /// Whether this message requests a broadcast fan-out.
    pub fn broadcast(&self) -> bool {
        self.flags.broadcast
    }

    /// Whether a broadcast fan-out should also deliver back to the original sender.
    pub fn send_broadcast_back_to_sender(&self) -> bool {
        self.flags.send_broadcast_back_to_sender
    }

    /// The reliability-stream class this message belongs to, used for IdProvider bookkeeping and
    /// per-class counters. Parts always belong to their parent's class.
    pub fn class(&self) -> &'static str {
        match self.control {
            Some(ControlKind::ConnectRequest) => "connect_request",
            Some(ControlKind::LeaveRequest) => "leave_request",
            Some(ControlKind::KeepAlive(_)) => "keep_alive",
            None => "application",
        }
    }
}

/// Fixed header reserved within `maximum_udp_packet_size` for a [`MessagePart`]'s
/// `(parent_id, part_index, part_count)` metadata.
pub const PART_HEADER_SIZE: usize = 8 + 2 + 2;

/// A fragment of an oversize [`Message`], carrying ordering metadata so the receiver can
/// reassemble the parent.
#[derive(Clone, Debug)]
pub struct MessagePart {
    /// The ID the parent message was stepped back to (shared across all parts).
    pub parent_id: u64,
    /// 0-based index of this part within the parent.
    pub part_index: u16,
    /// Total number of parts the parent was split into.
    pub part_count: u16,
    /// This part's slice of the parent's encoded payload.
    pub bytes: Box<[u8]>,
    /// Always inherited from the parent; parts of a reliable message are always reliable.
    pub reliable_mode: ReliableMode,
    /// Addressed to the same recipient as the parent.
    pub socket_address_recipient: Option<SocketAddr>,
    /// The parent's sender/receiver identity, so registry bookkeeping stays consistent.
    pub sender_id: u32,
    /// See `sender_id`.
    pub receiver_id: u32,
}

impl MessagePart {
    /// Wraps this part back into a generic [`Message`] so it can re-enter the paced send queue
    /// as an ordinary queue entry. The resulting message's `payload` is already final; the send
    /// pipeline's size check must recognize it (via [`Message::control`] being absent and the
    /// part already being at-or-under size) so it is never fragmented again.
    pub fn into_message(self) -> Message {
        let mut m = Message::new(self.bytes, self.reliable_mode);
        m.msg_id = self.parent_id;
        m.sender_id = self.sender_id;
        m.receiver_id = self.receiver_id;
        m.socket_address_recipient = self.socket_address_recipient;
        m.payload = m.body.to_vec();
        m.prepared = true;
        m.flags.is_resend = false;
        m.flags.is_part = true;
        m
    }
}

/// Carries a batch of message IDs being acknowledged. Always [`ReliableMode::Unreliable`]: an ack
/// that is itself lost just gets superseded by the next batch.
#[derive(Clone, Debug)]
pub struct AckMessage {
    /// The IDs being acknowledged in this batch.
    pub acked_ids: Vec<u64>,
    /// The client/peer this batch is addressed to on a server (0 for a plain client/server link).
    pub receiver_id: u32,
}

/// An empty heartbeat sent by a server to keep reliable-ordering ID streams advancing when idle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SequenceKeepAlive;
