//! Wire message types.
//!
//! Uses proper enums with `TryFrom`; no panics on unknown values.

use std::fmt;

use bytes::Bytes;

use crate::error::ArpError;

// ── MessageType ──────────────────────────────────────────────────

/// Channel a frame belongs to.
///
/// `Heartbeat` has no type byte on the wire; it is the zero-length frame.
/// Every other variant maps to the single type byte that follows the
/// length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Zero-length keep-alive frame.
    Heartbeat,
    /// Coded video sample (timestamp-prefixed).
    Video,
    /// Coded audio sample (timestamp-prefixed).
    Audio,
    /// Textual touch command batch.
    Touch,
    /// JSON control message.
    Protocol,
    /// Wall-clock timestamp exchange.
    Time,
    /// Key event.
    Key,
}

impl MessageType {
    /// The type byte written after the length prefix, `None` for heartbeats.
    pub fn wire_byte(self) -> Option<u8> {
        match self {
            Self::Heartbeat => None,
            Self::Video => Some(0),
            Self::Audio => Some(1),
            Self::Touch => Some(2),
            Self::Protocol => Some(3),
            Self::Time => Some(4),
            Self::Key => Some(6),
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = ArpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Video),
            1 => Ok(Self::Audio),
            2 => Ok(Self::Touch),
            3 => Ok(Self::Protocol),
            4 => Ok(Self::Time),
            6 => Ok(Self::Key),
            _ => Err(ArpError::UnknownVariant {
                type_name: "MessageType",
                value: value as i64,
            }),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ── Message ──────────────────────────────────────────────────────

/// One decoded frame.
///
/// Frames whose type byte is not a known [`MessageType`] are kept as
/// `Unknown` by the codec so the stream stays in sync; the session ignores
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: Kind,
    payload: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Known(MessageType),
    Unknown(u8),
}

impl Message {
    pub fn new(message_type: MessageType, payload: impl Into<Bytes>) -> Self {
        if message_type == MessageType::Heartbeat {
            return Self::heartbeat();
        }
        Self {
            kind: Kind::Known(message_type),
            payload: payload.into(),
        }
    }

    /// The zero-length keep-alive frame.
    pub fn heartbeat() -> Self {
        Self {
            kind: Kind::Known(MessageType::Heartbeat),
            payload: Bytes::new(),
        }
    }

    /// Build a message from a raw type byte, preserving unknown types.
    pub(crate) fn from_wire(type_byte: u8, payload: Bytes) -> Self {
        let kind = match MessageType::try_from(type_byte) {
            Ok(t) => Kind::Known(t),
            Err(_) => Kind::Unknown(type_byte),
        };
        Self { kind, payload }
    }

    /// JSON control message.
    pub fn protocol(json: impl Into<Bytes>) -> Self {
        Self::new(MessageType::Protocol, json)
    }

    /// Touch command batch.
    pub fn touch(commands: String) -> Self {
        Self::new(MessageType::Touch, commands)
    }

    /// Local wall-clock time in milliseconds, big-endian.
    pub fn time(unix_millis: i64) -> Self {
        Self::new(MessageType::Time, unix_millis.to_be_bytes().to_vec())
    }

    /// The message type, `None` if the type byte is not recognised.
    pub fn message_type(&self) -> Option<MessageType> {
        match self.kind {
            Kind::Known(t) => Some(t),
            Kind::Unknown(_) => None,
        }
    }

    /// The type byte as written on the wire (`None` for heartbeats).
    pub fn type_byte(&self) -> Option<u8> {
        match self.kind {
            Kind::Known(t) => t.wire_byte(),
            Kind::Unknown(b) => Some(b),
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.kind == Kind::Known(MessageType::Heartbeat)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Frame length as written in the length prefix.
    pub fn frame_len(&self) -> usize {
        if self.is_heartbeat() {
            0
        } else {
            1 + self.payload.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_roundtrip() {
        let types = [
            MessageType::Video,
            MessageType::Audio,
            MessageType::Touch,
            MessageType::Protocol,
            MessageType::Time,
            MessageType::Key,
        ];
        for t in types {
            let byte = t.wire_byte().unwrap();
            assert_eq!(MessageType::try_from(byte).unwrap(), t);
        }
        assert_eq!(MessageType::Heartbeat.wire_byte(), None);
    }

    #[test]
    fn message_type_invalid() {
        assert!(MessageType::try_from(5).is_err());
        assert!(MessageType::try_from(0xFF).is_err());
    }

    #[test]
    fn heartbeat_drops_payload() {
        let m = Message::new(MessageType::Heartbeat, vec![1, 2, 3]);
        assert!(m.is_heartbeat());
        assert!(m.payload().is_empty());
        assert_eq!(m.frame_len(), 0);
    }

    #[test]
    fn time_message_is_big_endian() {
        let m = Message::time(0x0102_0304_0506_0708);
        assert_eq!(m.message_type(), Some(MessageType::Time));
        assert_eq!(m.payload(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn unknown_type_is_preserved() {
        let m = Message::from_wire(9, Bytes::from_static(b"x"));
        assert_eq!(m.message_type(), None);
        assert_eq!(m.type_byte(), Some(9));
        assert_eq!(m.frame_len(), 2);
    }
}
