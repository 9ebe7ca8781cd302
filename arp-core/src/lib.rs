//! # arp-core
//!
//! Client-side protocol library for streaming a remote device.
//!
//! This crate contains:
//! - **Wire types**: `Message`, `MessageType`, `AvPacket`
//! - **Codec**: `MessageCodec` for framed TCP I/O via `tokio_util`
//! - **Protocol payloads**: JSON control messages, touch and video settings
//! - **Network**: `Transport`, the framed socket with read/write/heartbeat loops
//! - **State**: `SessionPhase`, the validated session lifecycle
//! - **Session**: the actor that drives one device connection
//! - **Media**: decode queues, pipelines and the decoder seam
//! - **Touch**: gesture to touch-command encoding
//! - **Task**: `TaskGroup` for cancellable background loops
//! - **Error**: `ArpError` and the owner-facing `ErrorCode` space

pub mod codec;
pub mod config;
pub mod error;
pub mod media;
pub mod message;
pub mod network;
pub mod packet;
pub mod protocol;
pub mod session;
pub mod state;
pub mod task;
pub mod touch;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{MAX_FRAME_SIZE, MessageCodec};
pub use config::{Quality, SessionConfig};
pub use error::{ArpError, ErrorCode, SessionError};
pub use media::{
    DecodeOutcome, DecodePipeline, DecodeQueue, DecoderFactory, MediaDecoder, MediaFormat,
    MediaKind, MediaPlayer, PipelineEvent,
};
pub use message::{Message, MessageType};
pub use network::{DeviceAddress, Transport, TransportEvent};
pub use packet::AvPacket;
pub use protocol::{ControlMessage, Rect, TouchSetting, VideoInfo};
pub use session::{CloseReason, Session, SessionEvent, SessionStatus};
pub use state::SessionPhase;
pub use task::TaskGroup;
pub use touch::{Pointer, TouchAction, TouchEncoder, TouchEvent, TouchMapping};
