//! Packet queue between the session and a pipeline's consumer loop.
//!
//! The producer never waits. The consumer applies drop-oldest backpressure
//! when it wakes: it takes one packet, keeps taking while the backlog is
//! still above `capacity`, and hands back only the last packet it took.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::packet::AvPacket;

#[derive(Debug, Default)]
pub struct DecodeQueue {
    packets: Mutex<VecDeque<AvPacket>>,
    ready: Notify,
}

impl DecodeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AvPacket>> {
        // A panicking consumer leaves the deque itself intact.
        self.packets.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a packet and wake the consumer.
    pub fn push(&self, packet: AvPacket) {
        self.lock().push_back(packet);
        self.ready.notify_one();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every queued packet.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Apply the drain rule once without waiting.
    ///
    /// Returns the packet to submit and how many stale packets were
    /// discarded to reach it.
    pub fn try_drain(&self, capacity: usize) -> Option<(AvPacket, usize)> {
        let mut packets = self.lock();
        let mut latest = packets.pop_front()?;
        let mut dropped = 0;
        while packets.len() > capacity {
            match packets.pop_front() {
                Some(next) => {
                    latest = next;
                    dropped += 1;
                }
                None => break,
            }
        }
        Some((latest, dropped))
    }

    /// Wait for at least one packet, then apply the drain rule.
    ///
    /// Returns `None` as soon as `cancel` fires.
    pub async fn next(
        &self,
        capacity: usize,
        cancel: &CancellationToken,
    ) -> Option<(AvPacket, usize)> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            if let Some(drained) = self.try_drain(capacity) {
                return Some(drained);
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = self.ready.notified() => {}
            }
        }
    }
}
