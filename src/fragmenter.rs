use crate::error::{CoreError, Result};
use crate::message::{Message, MessagePart, ReliableMode, PART_HEADER_SIZE};

/// Splits an oversize, encoded [`Message`] into an ordered sequence of [`MessagePart`]s, each
/// sized to fit within `maximum_udp_packet_size` once [`PART_HEADER_SIZE`] is accounted for.
///
/// Unreliable messages are never fragmented: dropping one fragment of an unreliable message
/// would corrupt the reassembly with no way to recover, defeating the point of choosing
/// `UNRELIABLE` in the first place.
pub struct Fragmenter {
    maximum_udp_packet_size: usize,
}

impl Fragmenter {
    /// Creates a fragmenter bound to the peer's configured packet size ceiling.
    pub fn new(maximum_udp_packet_size: usize) -> Self {
        Self {
            maximum_udp_packet_size,
        }
    }

    /// Splits `message`'s encoded `payload` into ordered parts. `message.msg_id` must already be
    /// the parent ID the caller stepped back to; every part inherits it.
    ///
    /// Returns [`CoreError::UnfragmentableMode`] for unreliable messages, and
    /// [`CoreError::Unsplittable`] if the payload is empty or the fragment size would be zero or
    /// negative after subtracting the header.
    pub fn split(&self, message: &Message) -> Result<Vec<MessagePart>> {
        if message.reliable_mode == ReliableMode::Unreliable {
            return Err(CoreError::UnfragmentableMode {
                mode: message.reliable_mode,
            });
        }

        let fragment_size = self
            .maximum_udp_packet_size
            .checked_sub(PART_HEADER_SIZE)
            .filter(|&n| n > 0);

        let fragment_size = match fragment_size {
            Some(n) => n,
            None => {
                return Err(CoreError::Unsplittable {
                    msg_id: message.msg_id,
                    size: message.payload.len(),
                })
            }
        };

        if message.payload.is_empty() {
            return Err(CoreError::Unsplittable {
                msg_id: message.msg_id,
                size: 0,
            });
        }

        let part_count = (message.payload.len() + fragment_size - 1) / fragment_size;
        if part_count > u16::MAX as usize {
            return Err(CoreError::Unsplittable {
                msg_id: message.msg_id,
                size: message.payload.len(),
            });
        }

        let parts = message
            .payload
            .chunks(fragment_size)
            .enumerate()
            .map(|(index, chunk)| MessagePart {
                parent_id: message.msg_id,
                part_index: index as u16,
                part_count: part_count as u16,
                bytes: chunk.to_vec().into_boxed_slice(),
                reliable_mode: message.reliable_mode,
                socket_address_recipient: message.socket_address_recipient,
                sender_id: message.sender_id,
                receiver_id: message.receiver_id,
            })
            .collect();

        Ok(parts)
    }
}
