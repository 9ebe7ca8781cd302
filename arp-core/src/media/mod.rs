//! Media decode path: per-kind packet queues feeding a pluggable decoder.
//!
//! ```text
//! Session ──push──► DecodeQueue ──drain──► consumer loop ──► MediaDecoder
//!                                               │
//!                                               └──► PipelineEvent ──► Session
//! ```
//!
//! The decoder itself lives outside this crate; callers provide a
//! [`DecoderFactory`] that builds one per [`MediaFormat`].

pub mod decoder;
pub mod pipeline;
pub mod player;
pub mod queue;

use std::fmt;

pub use decoder::{DecodeOutcome, DecoderFactory, MediaDecoder};
pub use pipeline::{DecodePipeline, PipelineEvent};
pub use player::MediaPlayer;
pub use queue::DecodeQueue;

/// AAC sample rate the device streams at.
pub const AUDIO_SAMPLE_RATE: u32 = 44_100;
/// Stereo.
pub const AUDIO_CHANNELS: u16 = 2;

// ── MediaKind ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

// ── MediaFormat ──────────────────────────────────────────────────

/// What a decoder is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    /// H.264 at the given coded size.
    Video { width: u32, height: u32 },
    /// AAC with the given layout.
    Audio { sample_rate: u32, channels: u16 },
}

impl MediaFormat {
    pub fn video(width: u32, height: u32) -> Self {
        Self::Video { width, height }
    }

    /// The only audio layout the device sends.
    pub fn default_audio() -> Self {
        Self::Audio {
            sample_rate: AUDIO_SAMPLE_RATE,
            channels: AUDIO_CHANNELS,
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Video { .. } => MediaKind::Video,
            Self::Audio { .. } => MediaKind::Audio,
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video { width, height } => write!(f, "video {width}x{height}"),
            Self::Audio {
                sample_rate,
                channels,
            } => write!(f, "audio {sample_rate}Hz/{channels}ch"),
        }
    }
}
