//! Length-prefixed framing for the device stream.
//!
//! ```text
//! length: u32 BE
//! length == 0  -> heartbeat, nothing follows
//! length  > 0  -> type: u8, payload: [u8; length - 1]
//! ```
//!
//! The decoder only consumes complete frames and leaves partial input in
//! the buffer, so reassembly does not depend on how the stream is split.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ArpError;
use crate::message::Message;

/// Size of the length prefix.
pub const LENGTH_SIZE: usize = 4;

/// Largest frame accepted from the wire. A corrupt length prefix beyond
/// this is treated as a broken stream.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// `tokio_util` codec for [`Message`] frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCodec {
    max_frame_size: usize,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    fn limit(&self) -> usize {
        if self.max_frame_size == 0 {
            MAX_FRAME_SIZE
        } else {
            self.max_frame_size
        }
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = ArpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_SIZE {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_SIZE];
        prefix.copy_from_slice(&src[..LENGTH_SIZE]);
        let length = u32::from_be_bytes(prefix) as usize;

        if length > self.limit() {
            return Err(ArpError::FrameTooLarge {
                size: length,
                max: self.limit(),
            });
        }

        if length == 0 {
            src.advance(LENGTH_SIZE);
            return Ok(Some(Message::heartbeat()));
        }

        if src.len() < LENGTH_SIZE + length {
            src.reserve(LENGTH_SIZE + length - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_SIZE);
        let type_byte = src.get_u8();
        let payload = src.split_to(length - 1).freeze();
        Ok(Some(Message::from_wire(type_byte, payload)))
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ArpError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let length = item.frame_len();
        if length > self.limit() {
            return Err(ArpError::FrameTooLarge {
                size: length,
                max: self.limit(),
            });
        }

        dst.reserve(LENGTH_SIZE + length);
        dst.put_u32(length as u32);
        if let Some(type_byte) = item.type_byte() {
            dst.put_u8(type_byte);
            dst.extend_from_slice(item.payload());
        }
        Ok(())
    }
}
