use std::net::{self, SocketAddr};

use crate::message::Message;

/// The external collaborator responsible for raw datagram I/O and payload encoding. The core
/// never touches a socket or a wire format directly; everything flows through an implementation
/// of this trait.
pub trait UdpTransport: Send {
    /// Opens the underlying socket (or equivalent). Returns `false` on failure, leaving the
    /// owning [`PeerController`](crate::peer_controller::PeerController) in a not-connected
    /// state.
    fn start(&mut self) -> bool;

    /// Closes the underlying socket. No further `send`/`process` calls are made afterward.
    fn stop(&mut self);

    /// Drives any internal I/O bookkeeping; called once per `process()` tick after the pacing
    /// queue has had a chance to release a message.
    fn process(&mut self);

    /// Transmits `message.payload` to `message.socket_address_recipient`. The message is assumed
    /// already encoded by a prior `create_payload` call.
    fn send(&mut self, message: &Message);

    /// Populates `message.payload` with the wire-encoded bytes of `message.body`. Returns `false`
    /// on encoding failure.
    fn create_payload(&mut self, message: &mut Message) -> bool;

    /// Reads as many inbound datagrams as are currently available without blocking, decoding
    /// each into a `(Message, SocketAddr)` pair for the receive pipeline. An empty vector means
    /// no datagrams were pending.
    fn receive_pending(&mut self) -> Vec<(Message, SocketAddr)>;
}

/// A straightforward non-blocking [`std::net::UdpSocket`]-backed transport. Payload encoding is
/// the identity function (the message's raw `body` bytes, with a one-byte control-kind tag
/// prepended); a real deployment would plug in compression/encryption here, but that is outside
/// this crate's scope.
pub struct UdpSocketTransport {
    socket: Option<net::UdpSocket>,
    bind_addr: SocketAddr,
    recv_buf: Vec<u8>,
}

impl UdpSocketTransport {
    /// Creates a transport that will bind to `bind_addr` on [`start`](UdpTransport::start).
    pub fn new(bind_addr: SocketAddr, max_packet_size: usize) -> Self {
        Self {
            socket: None,
            bind_addr,
            recv_buf: vec![0u8; max_packet_size],
        }
    }

    /// The local address the socket is bound to, if started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

impl UdpTransport for UdpSocketTransport {
    fn start(&mut self) -> bool {
        match net::UdpSocket::bind(self.bind_addr) {
            Ok(socket) => {
                if socket.set_nonblocking(true).is_err() {
                    return false;
                }
                self.socket = Some(socket);
                true
            }
            Err(e) => {
                tracing::error!(error = %e, addr = %self.bind_addr, "failed to bind udp socket");
                false
            }
        }
    }

    fn stop(&mut self) {
        self.socket = None;
    }

    fn process(&mut self) {
        // Nothing to do beyond the socket itself; real transports might drain stats here.
    }

    fn send(&mut self, message: &Message) {
        let (Some(socket), Some(addr)) = (self.socket.as_ref(), message.socket_address_recipient)
        else {
            return;
        };
        if let Err(e) = socket.send_to(&message.payload, addr) {
            tracing::warn!(error = %e, %addr, msg_id = message.msg_id, "udp send failed");
        }
    }

    fn create_payload(&mut self, message: &mut Message) -> bool {
        message.payload = message.body.to_vec();
        true
    }

    fn receive_pending(&mut self) -> Vec<(Message, SocketAddr)> {
        let Some(socket) = self.socket.as_ref() else {
            return Vec::new();
        };

        let mut out = Vec::new();
        loop {
            match socket.recv_from(&mut self.recv_buf) {
                Ok((n, addr)) => {
                    let body = self.recv_buf[..n].to_vec().into_boxed_slice();
                    let mut m = Message::new(body.clone(), crate::message::ReliableMode::Unreliable);
                    m.payload = body.to_vec();
                    out.push((m, addr));
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!(error = %e, "udp recv failed");
                    break;
                }
            }
        }
        out
    }
}
