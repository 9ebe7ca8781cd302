//! The device session: lifecycle, heartbeats, control dispatch and media
//! routing for one logical connection.
//!
//! All state lives in a single actor task. [`Session`] is a cheap, cloneable
//! handle that posts commands to it; transport frames, timers and decode
//! pipeline reports are consumed by the same task, so lifecycle transitions
//! never run concurrently. The owner observes the session through the
//! [`SessionEvent`] stream and the [`SessionStatus`] watch channel.
//!
//! ```text
//! start ──► Connecting ──► Connected ──stop──► Closing ──grace──► Closed
//!               ▲              │
//!     reconnect │              │ error / timeout / peer close / disconnect
//!               └─ Disconnected ◄┘
//! ```

mod actor;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::media::{DecoderFactory, MediaKind};
use crate::network::DeviceAddress;
use crate::protocol::VideoInfo;
use crate::state::SessionPhase;
use crate::touch::{TouchEncoder, TouchEvent, TouchMapping};

use actor::{Actor, Command};

// ── Events ───────────────────────────────────────────────────────

/// Why a connection ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Torn down by `disconnect`, or by the grace timer after `stop`.
    Local,
    /// The device closed the stream.
    Peer,
}

/// What the session reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The socket is up and the connect request has been sent.
    Connected,
    /// The device announced its video format; a decode pipeline exists.
    Prepared(VideoInfo),
    /// The first frame of a pipeline was presented.
    FirstFrame(MediaKind),
    Closed(CloseReason),
    /// Delivered at most once per code per connection attempt.
    Error(SessionError),
}

/// Observable lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    /// A `reconnect` is in flight and has not connected yet.
    pub reconnecting: bool,
}

// ── Session ──────────────────────────────────────────────────────

/// Handle to a running session actor.
///
/// Every method waits until the actor has applied the request and returns
/// whether it had any effect. The actor exits, closing any connection,
/// once every handle is dropped.
#[derive(Debug, Clone)]
pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
    mapping: watch::Receiver<Option<Arc<TouchMapping>>>,
}

impl Session {
    /// Spawn the session actor.
    ///
    /// `decoders` builds a decoder for every pipeline the session starts.
    pub fn new(
        config: SessionConfig,
        decoders: Arc<dyn DecoderFactory>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());
        let (mapping_tx, mapping_rx) = watch::channel(None);

        let actor = Actor::new(config, decoders, command_rx, event_tx, status_tx, mapping_tx);
        tokio::spawn(actor.run());

        (
            Self {
                commands: command_tx,
                status: status_rx,
                mapping: mapping_rx,
            },
            event_rx,
        )
    }

    async fn request(&self, make: impl FnOnce(oneshot::Sender<bool>) -> Command) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(make(ack_tx)).is_err() {
            return false;
        }
        ack_rx.await.unwrap_or(false)
    }

    /// Connect to `address` using `token`.
    ///
    /// Effective from `Idle` or `Disconnected`. Rejected when the config
    /// fails [`SessionConfig::validate`].
    pub async fn start(&self, address: DeviceAddress, token: impl Into<String>) -> bool {
        let token = token.into();
        self.request(|ack| Command::Start {
            address,
            token,
            ack,
        })
        .await
    }

    /// Connect again with the previous address and token.
    ///
    /// Effective only from `Disconnected`; a stopped session never
    /// reconnects.
    pub async fn reconnect(&self) -> bool {
        self.request(|ack| Command::Reconnect { ack }).await
    }

    /// Ask the device to end the session, then tear down after the grace
    /// delay. Terminal.
    pub async fn stop(&self) -> bool {
        self.request(|ack| Command::Stop { ack }).await
    }

    /// Tear down the connection now. Idempotent.
    ///
    /// Once this returns, every loop of the connection has exited and no
    /// further event from it is delivered.
    pub async fn disconnect(&self) -> bool {
        self.request(|ack| Command::Disconnect { ack }).await
    }

    /// Send an encoded touch batch. Dropped unless connected.
    pub async fn send_touch(&self, batch: impl Into<String>) -> bool {
        let batch = batch.into();
        self.request(|ack| Command::SendTouch { batch, ack }).await
    }

    /// Encode `event` with `encoder` and send the result.
    pub async fn touch(&self, encoder: &TouchEncoder, event: &TouchEvent) -> bool {
        match encoder.encode(event) {
            Some(batch) => self.send_touch(batch).await,
            None => false,
        }
    }

    /// An encoder bound to this session's touch mapping.
    pub fn touch_encoder(&self) -> TouchEncoder {
        TouchEncoder::new(self.mapping.clone())
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.status.borrow().phase.clone()
    }

    /// A receiver that is notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }
}
