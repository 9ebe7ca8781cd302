//! Domain-specific error types for the ARP session protocol.
//!
//! All fallible operations return `Result<T, ArpError>`. Errors that reach
//! the owning application are flattened into a [`SessionError`] carrying an
//! integer [`ErrorCode`].

use std::fmt;
use std::time::Duration;

use thiserror::Error;

// ── ErrorCode ────────────────────────────────────────────────────

/// Flat integer error space reported to the owner of a session.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Connect failure, socket error or heartbeat timeout.
    Network = -1,
    /// The remote device closed the stream while we still wanted it.
    DisconnectedByDevice = -2,
    /// A decode pipeline failed.
    Media = 103,
    /// Malformed touch-capability settings.
    ProtocolTouchSetting = -10001,
    /// Malformed media-format settings.
    ProtocolVideoInfo = -10002,
    /// Malformed connect response.
    ConnectionResult = -10003,
    /// The device rejected the connect request (usually a version mismatch).
    ConnectionRefusedVersion = -10004,
}

impl ErrorCode {
    /// Raw integer value.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Default human-readable message for this code.
    pub fn message(self) -> &'static str {
        match self {
            Self::Network => "network error",
            Self::DisconnectedByDevice => "disconnected by remote device",
            Self::Media => "media data error",
            Self::ProtocolTouchSetting | Self::ProtocolVideoInfo | Self::ConnectionResult => {
                "remote device error"
            }
            Self::ConnectionRefusedVersion => "incompatible version",
        }
    }

    /// Returns `true` for codes that end the current connection and can be
    /// recovered from with `reconnect()`.
    pub fn is_transport(self) -> bool {
        matches!(self, Self::Network | Self::DisconnectedByDevice)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.as_i32())
    }
}

// ── ArpError ─────────────────────────────────────────────────────

/// The canonical error type for the ARP client.
#[derive(Debug, Error)]
pub enum ArpError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value}")]
    UnknownVariant { type_name: &'static str, value: i64 },

    /// A control message with a recognised id could not be parsed.
    #[error("malformed control message {id}: {reason}")]
    MalformedControl { id: i64, reason: String },

    /// The device answered the connect request with a non-zero result.
    #[error("connection refused by device (result {0})")]
    ConnectionRefused(i64),

    /// A media payload was too short to carry its timestamp prefix.
    #[error("media payload too short: {0} bytes")]
    TruncatedMedia(usize),

    /// A lifecycle transition was requested from the wrong phase.
    #[error("invalid transition: {0}")]
    InvalidTransition(&'static str),

    // ── Framing Errors ───────────────────────────────────────────
    /// Frame length prefix exceeded the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The peer closed the stream.
    #[error("connection closed by remote device")]
    ClosedByPeer,

    /// No inbound frame arrived within the receive deadline.
    #[error("no frame received for {0:?}")]
    HeartbeatTimeout(Duration),

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    // ── Serialization Errors ─────────────────────────────────────
    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Media Errors ─────────────────────────────────────────────
    /// The decoder failed; the pipeline that owns it has stopped.
    #[error("decoder error: {0}")]
    Decoder(String),

    // ── Configuration Errors ─────────────────────────────────────
    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl ArpError {
    /// Classify this error into the owner-facing code space.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MalformedControl { id, .. } => match *id {
                crate::protocol::TOUCH_SETTING_ID => ErrorCode::ProtocolTouchSetting,
                crate::protocol::VIDEO_INFO_ID => ErrorCode::ProtocolVideoInfo,
                _ => ErrorCode::ConnectionResult,
            },
            Self::ConnectionRefused(_) => ErrorCode::ConnectionRefusedVersion,
            Self::ClosedByPeer => ErrorCode::DisconnectedByDevice,
            Self::Decoder(_) | Self::TruncatedMedia(_) => ErrorCode::Media,
            _ => ErrorCode::Network,
        }
    }
}

// ── SessionError ─────────────────────────────────────────────────

/// An error as delivered to the owner of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub code: ErrorCode,
    pub message: String,
}

impl SessionError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&ArpError> for SessionError {
    fn from(e: &ArpError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl From<ErrorCode> for SessionError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code, code.message())
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_i32(), self.message)
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for ArpError {
    fn from(s: String) -> Self {
        ArpError::Other(s)
    }
}

impl From<&str> for ArpError {
    fn from(s: &str) -> Self {
        ArpError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for ArpError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        ArpError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = ArpError::FrameTooLarge {
            size: 1000,
            max: 500,
        };
        assert!(e.to_string().contains("1000"));
        assert!(e.to_string().contains("500"));
    }

    #[test]
    fn from_io_is_network() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: ArpError = io_err.into();
        assert!(matches!(e, ArpError::Connection(_)));
        assert_eq!(e.code(), ErrorCode::Network);
    }

    #[test]
    fn classification() {
        assert_eq!(
            ArpError::HeartbeatTimeout(Duration::from_secs(15)).code(),
            ErrorCode::Network
        );
        assert_eq!(ArpError::ClosedByPeer.code(), ErrorCode::DisconnectedByDevice);
        assert_eq!(
            ArpError::ConnectionRefused(3).code(),
            ErrorCode::ConnectionRefusedVersion
        );
        assert_eq!(ArpError::Decoder("boom".into()).code(), ErrorCode::Media);
        let touch = ArpError::MalformedControl {
            id: crate::protocol::TOUCH_SETTING_ID,
            reason: "x".into(),
        };
        assert_eq!(touch.code(), ErrorCode::ProtocolTouchSetting);
        let video = ArpError::MalformedControl {
            id: crate::protocol::VIDEO_INFO_ID,
            reason: "x".into(),
        };
        assert_eq!(video.code(), ErrorCode::ProtocolVideoInfo);
    }

    #[test]
    fn code_values_and_messages() {
        for code in [
            ErrorCode::Network,
            ErrorCode::DisconnectedByDevice,
            ErrorCode::Media,
            ErrorCode::ProtocolTouchSetting,
            ErrorCode::ProtocolVideoInfo,
            ErrorCode::ConnectionResult,
            ErrorCode::ConnectionRefusedVersion,
        ] {
            assert_eq!(code as i32, code.as_i32());
            assert!(!code.message().is_empty());
        }
        assert_eq!(ErrorCode::Media.as_i32(), 103);
        assert_eq!(ErrorCode::ConnectionRefusedVersion.as_i32(), -10004);
        assert_eq!(ErrorCode::ConnectionRefusedVersion.message(), "incompatible version");
    }

    #[test]
    fn session_error_from_code_uses_default_message() {
        let e = SessionError::from(ErrorCode::Network);
        assert_eq!(e.message, "network error");
        assert_eq!(e.to_string(), "[-1] network error");
    }
}
