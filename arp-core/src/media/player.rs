//! Owns the audio and video pipelines of one connection.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::error::ArpError;
use crate::media::{DecodePipeline, DecoderFactory, MediaFormat, MediaKind, PipelineEvent};
use crate::packet::AvPacket;

pub struct MediaPlayer {
    factory: Arc<dyn DecoderFactory>,
    events: mpsc::UnboundedSender<PipelineEvent>,
    video_capacity: usize,
    audio_capacity: usize,
    video: Option<DecodePipeline>,
    audio: Option<DecodePipeline>,
}

impl std::fmt::Debug for MediaPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaPlayer")
            .field("video", &self.video)
            .field("audio", &self.audio)
            .finish()
    }
}

impl MediaPlayer {
    pub fn new(
        factory: Arc<dyn DecoderFactory>,
        events: mpsc::UnboundedSender<PipelineEvent>,
        video_capacity: usize,
        audio_capacity: usize,
    ) -> Self {
        Self {
            factory,
            events,
            video_capacity,
            audio_capacity,
            video: None,
            audio: None,
        }
    }

    /// Start the audio pipeline if it is not already running.
    pub fn start_audio(&mut self) -> Result<(), ArpError> {
        if self.audio.is_some() {
            return Ok(());
        }
        self.audio = Some(self.build(MediaFormat::default_audio(), self.audio_capacity)?);
        Ok(())
    }

    /// Make sure a video pipeline for `width`x`height` is running.
    ///
    /// A running pipeline with other dimensions is stopped first. Returns
    /// `true` when a new pipeline was built.
    pub async fn configure_video(&mut self, width: u32, height: u32) -> Result<bool, ArpError> {
        let format = MediaFormat::video(width, height);
        if let Some(current) = &self.video {
            if current.format() == format {
                return Ok(false);
            }
        }
        if let Some(old) = self.video.take() {
            info!(from = %old.format(), to = %format, "video format changed");
            old.stop().await;
        }
        self.video = Some(self.build(format, self.video_capacity)?);
        Ok(true)
    }

    fn build(&self, format: MediaFormat, capacity: usize) -> Result<DecodePipeline, ArpError> {
        let decoder = self.factory.create(&format)?;
        Ok(DecodePipeline::start(
            format,
            decoder,
            capacity,
            self.events.clone(),
        ))
    }

    /// Route a packet to its pipeline. Packets with no pipeline are dropped.
    pub fn push(&self, kind: MediaKind, packet: AvPacket) {
        let pipeline = match kind {
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        };
        match pipeline {
            Some(p) => {
                p.push(packet);
                trace!(%kind, queued = p.queued(), "packet queued");
            }
            None => debug!(%kind, pts = packet.pts_micros(), "no pipeline, packet dropped"),
        }
    }

    pub fn video_format(&self) -> Option<MediaFormat> {
        self.video.as_ref().map(DecodePipeline::format)
    }

    pub fn has_pipeline(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Video => self.video.is_some(),
            MediaKind::Audio => self.audio.is_some(),
        }
    }

    /// Stop both pipelines and wait for their loops.
    pub async fn stop(&mut self) {
        if let Some(video) = self.video.take() {
            video.stop().await;
        }
        if let Some(audio) = self.audio.take() {
            audio.stop().await;
        }
    }
}
