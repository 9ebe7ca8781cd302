//! Timestamped media samples carried by Video and Audio frames.

use bytes::{Buf, Bytes};

use crate::error::ArpError;
use crate::message::Message;

/// Size of the big-endian presentation timestamp that prefixes every
/// Video/Audio payload.
pub const TIMESTAMP_SIZE: usize = 8;

/// A coded media sample waiting for the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvPacket {
    pts_micros: i64,
    data: Bytes,
}

impl AvPacket {
    pub fn new(pts_micros: i64, data: impl Into<Bytes>) -> Self {
        Self {
            pts_micros,
            data: data.into(),
        }
    }

    /// Split a Video/Audio payload into timestamp and coded bytes.
    pub fn from_payload(mut payload: Bytes) -> Result<Self, ArpError> {
        if payload.len() < TIMESTAMP_SIZE {
            return Err(ArpError::TruncatedMedia(payload.len()));
        }
        let pts_micros = payload.get_i64();
        Ok(Self {
            pts_micros,
            data: payload,
        })
    }

    /// Extract the packet carried by a media message.
    pub fn from_message(message: Message) -> Result<Self, ArpError> {
        Self::from_payload(message.into_payload())
    }

    /// Presentation timestamp in microseconds.
    pub fn pts_micros(&self) -> i64 {
        self.pts_micros
    }

    /// Coded media bytes (timestamp stripped).
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Serialize back into a Video/Audio payload.
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TIMESTAMP_SIZE + self.data.len());
        out.extend_from_slice(&self.pts_micros.to_be_bytes());
        out.extend_from_slice(&self.data);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_timestamp_prefix() {
        let mut payload = 1000i64.to_be_bytes().to_vec();
        payload.extend_from_slice(&[0xAB; 100]);

        let pkt = AvPacket::from_payload(Bytes::from(payload)).unwrap();
        assert_eq!(pkt.pts_micros(), 1000);
        assert_eq!(pkt.len(), 100);
        assert!(pkt.data().iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn negative_timestamp() {
        let pkt = AvPacket::new(-5, vec![1]);
        let back = AvPacket::from_payload(Bytes::from(pkt.to_payload())).unwrap();
        assert_eq!(back.pts_micros(), -5);
        assert_eq!(back.data(), &[1]);
    }

    #[test]
    fn timestamp_only_payload_is_empty_packet() {
        let pkt = AvPacket::from_payload(Bytes::from(7i64.to_be_bytes().to_vec())).unwrap();
        assert!(pkt.is_empty());
    }

    #[test]
    fn too_short() {
        let err = AvPacket::from_payload(Bytes::from_static(&[0, 1, 2])).unwrap_err();
        assert!(matches!(err, ArpError::TruncatedMedia(3)));
    }
}
