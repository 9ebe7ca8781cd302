//! Decoder seam.
//!
//! Implementations wrap a platform codec. The pipeline owns one decoder per
//! active format, calls [`MediaDecoder::decode`] from its consumer loop, and
//! calls [`MediaDecoder::release`] exactly once when the pipeline stops.

use crate::error::ArpError;
use crate::media::MediaFormat;
use crate::packet::AvPacket;

/// Result of submitting one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A frame (or audio buffer) was presented.
    Rendered,
    /// The decoder consumed the packet without producing output yet.
    NoOutput,
}

/// A hardware or software decoder for one media format.
#[async_trait::async_trait]
pub trait MediaDecoder: Send + 'static {
    /// Submit a packet and wait for the decoder's answer.
    ///
    /// An `Err` is fatal: the pipeline reports it and stops.
    async fn decode(&mut self, packet: AvPacket) -> Result<DecodeOutcome, ArpError>;

    /// Free codec resources.
    fn release(&mut self);
}

/// Builds decoders on demand, once per pipeline.
pub trait DecoderFactory: Send + Sync + 'static {
    fn create(&self, format: &MediaFormat) -> Result<Box<dyn MediaDecoder>, ArpError>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! Recording decoder for pipeline and player tests.

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use tokio::sync::Semaphore;

    use super::*;

    #[derive(Clone, Default)]
    pub(crate) struct MockDecoder {
        pub submitted: Arc<Mutex<Vec<i64>>>,
        pub released: Arc<AtomicBool>,
        /// When set, each decode waits for one permit after recording.
        pub gate: Option<Arc<Semaphore>>,
        pub fail_at: Option<i64>,
        pub no_output: bool,
    }

    impl MockDecoder {
        pub fn submitted(&self) -> Vec<i64> {
            self.submitted.lock().unwrap().clone()
        }

        pub fn is_released(&self) -> bool {
            self.released.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl MediaDecoder for MockDecoder {
        async fn decode(&mut self, packet: AvPacket) -> Result<DecodeOutcome, ArpError> {
            let pts = packet.pts_micros();
            self.submitted.lock().unwrap().push(pts);
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if self.fail_at == Some(pts) {
                return Err(ArpError::Decoder(format!("cannot decode pts {pts}")));
            }
            if self.no_output {
                Ok(DecodeOutcome::NoOutput)
            } else {
                Ok(DecodeOutcome::Rendered)
            }
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    /// Hands out clones of `template`, so tests observe every decoder it built.
    #[derive(Clone, Default)]
    pub(crate) struct MockFactory {
        pub template: MockDecoder,
        pub created: Arc<Mutex<Vec<MediaFormat>>>,
        pub fail: bool,
        pub builds: Arc<AtomicUsize>,
    }

    impl MockFactory {
        pub fn created(&self) -> Vec<MediaFormat> {
            self.created.lock().unwrap().clone()
        }
    }

    impl DecoderFactory for MockFactory {
        fn create(&self, format: &MediaFormat) -> Result<Box<dyn MediaDecoder>, ArpError> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ArpError::Decoder(format!("no decoder for {format}")));
            }
            self.created.lock().unwrap().push(*format);
            Ok(Box::new(self.template.clone()))
        }
    }
}
