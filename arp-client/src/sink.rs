//! Headless media sink.
//!
//! There is no display here, so decoding is replaced by bookkeeping: each
//! packet is counted and reported as presented.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arp_core::{ArpError, AvPacket, DecodeOutcome, DecoderFactory, MediaDecoder, MediaFormat, MediaKind};
use tracing::{debug, trace};

/// Counters shared by every decoder a factory builds.
#[derive(Debug, Default)]
pub struct MediaStats {
    video_packets: AtomicU64,
    audio_packets: AtomicU64,
    bytes: AtomicU64,
}

/// Point-in-time copy of [`MediaStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub video_packets: u64,
    pub audio_packets: u64,
    pub bytes: u64,
}

impl MediaStats {
    fn record(&self, kind: MediaKind, len: usize) {
        let counter = match kind {
            MediaKind::Video => &self.video_packets,
            MediaKind::Audio => &self.audio_packets,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            video_packets: self.video_packets.load(Ordering::Relaxed),
            audio_packets: self.audio_packets.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

/// Counts packets instead of decoding them.
pub struct CountingDecoder {
    format: MediaFormat,
    stats: Arc<MediaStats>,
    packets: u64,
}

#[async_trait::async_trait]
impl MediaDecoder for CountingDecoder {
    async fn decode(&mut self, packet: AvPacket) -> Result<DecodeOutcome, ArpError> {
        trace!(format = %self.format, pts = packet.pts_micros(), len = packet.len(), "packet");
        self.packets += 1;
        self.stats.record(self.format.kind(), packet.len());
        Ok(DecodeOutcome::Rendered)
    }

    fn release(&mut self) {
        debug!(format = %self.format, packets = self.packets, "decoder released");
    }
}

/// Builds a [`CountingDecoder`] for every format.
#[derive(Debug, Clone, Default)]
pub struct CountingDecoderFactory {
    stats: Arc<MediaStats>,
}

impl CountingDecoderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Arc<MediaStats> {
        self.stats.clone()
    }
}

impl DecoderFactory for CountingDecoderFactory {
    fn create(&self, format: &MediaFormat) -> Result<Box<dyn MediaDecoder>, ArpError> {
        debug!(%format, "creating decoder");
        Ok(Box::new(CountingDecoder {
            format: *format,
            stats: self.stats.clone(),
            packets: 0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn decoders_share_counters() {
        let factory = CountingDecoderFactory::new();
        let mut video = factory.create(&MediaFormat::video(720, 1280)).unwrap();
        let mut audio = factory.create(&MediaFormat::default_audio()).unwrap();

        for pts in 0..3 {
            let outcome = video.decode(AvPacket::new(pts, vec![0; 100])).await.unwrap();
            assert_eq!(outcome, DecodeOutcome::Rendered);
        }
        audio.decode(AvPacket::new(0, vec![0; 10])).await.unwrap();
        video.release();
        audio.release();

        assert_eq!(
            factory.stats().snapshot(),
            StatsSnapshot {
                video_packets: 3,
                audio_packets: 1,
                bytes: 310,
            }
        );
    }
}
