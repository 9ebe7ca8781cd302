//! One media kind's queue plus the consumer loop that feeds its decoder.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::ArpError;
use crate::media::{DecodeOutcome, DecodeQueue, MediaDecoder, MediaFormat, MediaKind};
use crate::packet::AvPacket;
use crate::task::TaskGroup;

/// Reported by a pipeline's consumer loop.
#[derive(Debug)]
pub enum PipelineEvent {
    /// The first decoded output of this pipeline was presented.
    FirstFrame(MediaKind),
    /// The decoder failed; the pipeline has stopped consuming.
    Failed(MediaKind, ArpError),
}

/// A running decode path for one [`MediaFormat`].
///
/// Dropping the pipeline cancels its loop; [`stop`](Self::stop) also waits
/// for it, so no event is sent afterwards.
#[derive(Debug)]
pub struct DecodePipeline {
    format: MediaFormat,
    queue: Arc<DecodeQueue>,
    tasks: TaskGroup,
}

impl DecodePipeline {
    /// Spawn the consumer loop for `decoder`.
    ///
    /// `capacity` is the backlog the loop drains down to before each
    /// submission.
    pub fn start(
        format: MediaFormat,
        mut decoder: Box<dyn MediaDecoder>,
        capacity: usize,
        events: mpsc::UnboundedSender<PipelineEvent>,
    ) -> Self {
        let kind = format.kind();
        let queue = Arc::new(DecodeQueue::new());
        let mut tasks = TaskGroup::new("decode");

        let consumer_queue = queue.clone();
        tasks.spawn("consumer", move |cancel| async move {
            let mut first_frame = false;
            while let Some((packet, dropped)) = consumer_queue.next(capacity, &cancel).await {
                if dropped > 0 {
                    debug!(%kind, dropped, "decoder behind, dropped stale packets");
                }
                trace!(%kind, pts = packet.pts_micros(), len = packet.len(), "decode");

                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    r = decoder.decode(packet) => r,
                };
                match result {
                    Ok(DecodeOutcome::Rendered) if !first_frame => {
                        first_frame = true;
                        debug!(%kind, "first frame");
                        let _ = events.send(PipelineEvent::FirstFrame(kind));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(%kind, "decoder failed: {e}");
                        let _ = events.send(PipelineEvent::Failed(kind, e));
                        break;
                    }
                }
            }
            decoder.release();
        });

        debug!(%format, capacity, "decode pipeline started");
        Self {
            format,
            queue,
            tasks,
        }
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    /// Queue a packet. Never waits.
    pub fn push(&self, packet: AvPacket) {
        self.queue.push(packet);
    }

    /// Packets waiting for the consumer.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// `false` once the consumer loop has exited (stopped or failed).
    pub fn is_running(&self) -> bool {
        self.tasks.running() > 0
    }

    /// Interrupt the consumer, wait for it, and drop anything still queued.
    /// The decoder is released before this returns.
    pub async fn stop(mut self) {
        self.tasks.shutdown().await;
        self.queue.clear();
        debug!(format = %self.format, "decode pipeline stopped");
    }
}
