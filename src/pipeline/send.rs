use std::collections::VecDeque;

use crate::config::{Config, State};
use crate::error::{CoreError, Result};
use crate::fragmenter::Fragmenter;
use crate::message::Message;
use crate::transport::UdpTransport;

/// Runs a single [`Message`] through: resolve → payload → pre-send → size-check → transmit →
/// post-send. Every stage must succeed for the message to actually reach the transport; a
/// failure at any stage aborts the remaining steps and is reported as a typed [`CoreError`].
pub struct SendPipeline {
    fragmenter: Fragmenter,
}

impl SendPipeline {
    /// Creates a pipeline bound to `config`'s packet size ceiling.
    pub fn new(config: &Config) -> Self {
        Self {
            fragmenter: Fragmenter::new(config.maximum_udp_packet_size),
        }
    }

    /// Drives `message` through the full send pipeline. On success, `transport.send` has been
    /// called exactly once with the encoded payload and resolved recipient. On a splittable
    /// oversize failure, `out_queue` gains the message's [`crate::message::MessagePart`]s
    /// (wrapped back into `Message`s) at its tail, and the original message is not sent.
    pub fn send(
        &self,
        mut message: Message,
        config: &Config,
        state: &State,
        transport: &mut dyn UdpTransport,
        out_queue: &mut VecDeque<Message>,
        is_part: bool,
    ) -> Result<()> {
        // 1. resolve
        message.resolve();
        message.prepare_to_send();
        if message.msg_id == 0 {
            message.msg_id = state.id_provider.next_id(&message);
        }

        // 2. createPayload
        if !transport.create_payload(&mut message) {
            tracing::error!(msg_id = message.msg_id, "payload encoding failed");
            return Err(CoreError::EncodingFailure {
                msg_id: message.msg_id,
            });
        }

        // 3. beforeSend
        let message = match state.chain.run_sender_pre(message) {
            Some(m) => m,
            None => {
                tracing::trace!("message discarded by sender-pre chain");
                return Err(CoreError::ProcessorDiscard {
                    msg_id: None,
                    stage: "sender-pre",
                });
            }
        };

        // 4. checkPayloadSize
        let mut message = message;
        if message.payload.len() > config.maximum_udp_packet_size && !is_part {
            state.id_provider.step_back(&message);

            if config.auto_split_too_big_messages {
                match self.fragmenter.split(&message) {
                    Ok(parts) => {
                        let size = message.payload.len();
                        let part_count = parts.len();
                        for part in parts {
                            out_queue.push_back(part.into_message());
                        }
                        tracing::warn!(
                            msg_id = message.msg_id,
                            size,
                            part_count,
                            "message exceeded maximum packet size; auto-split into parts"
                        );
                        return Err(CoreError::Fragmented {
                            msg_id: message.msg_id,
                            size,
                            part_count,
                        });
                    }
                    Err(e) => {
                        tracing::error!(msg_id = message.msg_id, "fragmentation failed: {e}");
                        return Err(e);
                    }
                }
            } else {
                let size = message.payload.len();
                tracing::error!(msg_id = message.msg_id, size, "oversize message, auto-split disabled");
                return Err(CoreError::Unsplittable {
                    msg_id: message.msg_id,
                    size,
                });
            }
        }

        // 5. transmit
        transport.send(&message);

        // 6. afterSend
        match state.chain.run_sender_post(message) {
            Some(_) => Ok(()),
            None => {
                tracing::trace!("message discarded by sender-post chain");
                Err(CoreError::ProcessorDiscard {
                    msg_id: None,
                    stage: "sender-post",
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ReliableMode;
    use std::net::SocketAddr;

    struct RecordingTransport {
        sent: Vec<Message>,
        encode_ok: bool,
    }

    impl RecordingTransport {
        fn new() -> Self {
            Self {
                sent: Vec::new(),
                encode_ok: true,
            }
        }
    }

    impl UdpTransport for RecordingTransport {
        fn start(&mut self) -> bool {
            true
        }
        fn stop(&mut self) {}
        fn process(&mut self) {}
        fn send(&mut self, message: &Message) {
            self.sent.push(message.clone());
        }
        fn create_payload(&mut self, message: &mut Message) -> bool {
            if self.encode_ok {
                message.payload = message.body.to_vec();
            }
            self.encode_ok
        }
        fn receive_pending(&mut self) -> Vec<(Message, SocketAddr)> {
            Vec::new()
        }
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[test]
    fn successful_send_transmits_exactly_once() {
        let config = Config::default();
        let state = State::default();
        let pipeline = SendPipeline::new(&config);
        let mut transport = RecordingTransport::new();
        let mut queue = VecDeque::new();

        let mut m = Message::new(Box::new([1, 2, 3]), ReliableMode::Unreliable);
        m.socket_address_recipient = Some(addr());

        pipeline
            .send(m, &config, &state, &mut transport, &mut queue, false)
            .unwrap();

        assert_eq!(transport.sent.len(), 1);
        assert_eq!(transport.sent[0].socket_address_recipient, Some(addr()));
        assert!(queue.is_empty());
    }

    #[test]
    fn oversize_message_is_split_and_not_sent_directly() {
        let mut config = Config::default();
        config.maximum_udp_packet_size = 1200;
        let state = State::default();
        let pipeline = SendPipeline::new(&config);
        let mut transport = RecordingTransport::new();
        let mut queue = VecDeque::new();

        let body = vec![9u8; 3000].into_boxed_slice();
        let mut m = Message::new(body, ReliableMode::AckPacket);
        m.socket_address_recipient = Some(addr());

        let err = pipeline
            .send(m, &config, &state, &mut transport, &mut queue, false)
            .unwrap_err();

        assert!(matches!(err, CoreError::Fragmented { .. }));
        assert!(transport.sent.is_empty());

        let fragment_size = 1200 - crate::message::PART_HEADER_SIZE;
        let expected_parts = (3000 + fragment_size - 1) / fragment_size;
        assert_eq!(queue.len(), expected_parts);
    }

    #[test]
    fn encoding_failure_does_not_send() {
        let config = Config::default();
        let state = State::default();
        let pipeline = SendPipeline::new(&config);
        let mut transport = RecordingTransport::new();
        transport.encode_ok = false;
        let mut queue = VecDeque::new();

        let m = Message::new(Box::new([1]), ReliableMode::Unreliable);
        let err = pipeline
            .send(m, &config, &state, &mut transport, &mut queue, false)
            .unwrap_err();

        assert!(matches!(err, CoreError::EncodingFailure { .. }));
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn sender_pre_discard_prevents_transmit() {
        let config = Config::default();
        let chain = std::sync::Arc::new(
            crate::processor::ProcessorChain::new().with_sender_pre(|_m: Message| None),
        );
        let state = State::new(
            std::sync::Arc::new(crate::clock::SystemClock::new()),
            std::sync::Arc::new(crate::id_provider::SharedIdProvider::new()),
            chain,
        );
        let pipeline = SendPipeline::new(&config);
        let mut transport = RecordingTransport::new();
        let mut queue = VecDeque::new();

        let m = Message::new(Box::new([1]), ReliableMode::Unreliable);
        let err = pipeline
            .send(m, &config, &state, &mut transport, &mut queue, false)
            .unwrap_err();

        assert!(matches!(err, CoreError::ProcessorDiscard { .. }));
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn parts_are_never_refragmented() {
        let mut config = Config::default();
        config.maximum_udp_packet_size = 10;
        let state = State::default();
        let pipeline = SendPipeline::new(&config);
        let mut transport = RecordingTransport::new();
        let mut queue = VecDeque::new();

        // Simulate a part already at-or-under size; is_part=true must bypass the size check
        // even though the transport here is a toy that echoes body into payload untouched.
        let mut m = Message::new(vec![0u8; 20].into_boxed_slice(), ReliableMode::AckPacket);
        m.socket_address_recipient = Some(addr());

        pipeline
            .send(m, &config, &state, &mut transport, &mut queue, true)
            .unwrap();

        assert_eq!(transport.sent.len(), 1);
        assert!(queue.is_empty());
    }
}
