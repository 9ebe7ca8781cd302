use std::collections::HashSet;
use std::future::pending;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::error::{ArpError, ErrorCode, SessionError};
use crate::media::{DecoderFactory, MediaKind, MediaPlayer, PipelineEvent};
use crate::message::{Message, MessageType};
use crate::network::{DeviceAddress, Transport, TransportEvent};
use crate::packet::AvPacket;
use crate::protocol::{ConnectRequest, ControlMessage, StopRequest, TouchSetting, VideoInfo, parse_control};
use crate::session::{CloseReason, SessionEvent, SessionStatus};
use crate::state::SessionPhase;
use crate::touch::TouchMapping;

pub(super) enum Command {
    Start {
        address: DeviceAddress,
        token: String,
        ack: oneshot::Sender<bool>,
    },
    Reconnect {
        ack: oneshot::Sender<bool>,
    },
    Stop {
        ack: oneshot::Sender<bool>,
    },
    Disconnect {
        ack: oneshot::Sender<bool>,
    },
    SendTouch {
        batch: String,
        ack: oneshot::Sender<bool>,
    },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Start { .. } => "Start",
            Self::Reconnect { .. } => "Reconnect",
            Self::Stop { .. } => "Stop",
            Self::Disconnect { .. } => "Disconnect",
            Self::SendTouch { .. } => "SendTouch",
        };
        f.write_str(name)
    }
}

/// Outcome of a connect attempt, tagged with the attempt it belongs to.
type ConnectResult = (u64, Result<Transport, ArpError>);

pub(super) struct Actor {
    config: SessionConfig,
    phase: SessionPhase,
    reconnecting: bool,
    target: Option<(DeviceAddress, String)>,

    transport: Option<Transport>,
    // Bumped on every attempt and teardown; stale connect results are ignored
    attempt: u64,
    connecting: Option<JoinHandle<()>>,
    connect_tx: mpsc::UnboundedSender<ConnectResult>,
    connect_rx: mpsc::UnboundedReceiver<ConnectResult>,

    // Receive deadline, reset by every inbound frame
    deadline: Option<Instant>,
    // Deferred teardown after stop
    stop_at: Option<Instant>,

    player: MediaPlayer,
    pipeline_rx: mpsc::UnboundedReceiver<PipelineEvent>,

    reported: HashSet<ErrorCode>,
    muted: bool,

    touch_setting: Option<TouchSetting>,
    video_info: Option<VideoInfo>,

    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<SessionEvent>,
    status: watch::Sender<SessionStatus>,
    mapping: watch::Sender<Option<Arc<TouchMapping>>>,
}

impl Actor {
    pub(super) fn new(
        config: SessionConfig,
        decoders: Arc<dyn DecoderFactory>,
        commands: mpsc::UnboundedReceiver<Command>,
        events: mpsc::UnboundedSender<SessionEvent>,
        status: watch::Sender<SessionStatus>,
        mapping: watch::Sender<Option<Arc<TouchMapping>>>,
    ) -> Self {
        let (pipeline_tx, pipeline_rx) = mpsc::unbounded_channel();
        let (connect_tx, connect_rx) = mpsc::unbounded_channel();
        let player = MediaPlayer::new(
            decoders,
            pipeline_tx,
            config.video_queue_capacity,
            config.audio_queue_capacity,
        );
        Self {
            config,
            phase: SessionPhase::Idle,
            reconnecting: false,
            target: None,
            transport: None,
            attempt: 0,
            connecting: None,
            connect_tx,
            connect_rx,
            deadline: None,
            stop_at: None,
            player,
            pipeline_rx,
            reported: HashSet::new(),
            muted: false,
            touch_setting: None,
            video_info: None,
            commands,
            events,
            status,
            mapping,
        }
    }

    pub(super) async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => break,
                },
                Some((attempt, result)) = self.connect_rx.recv() => {
                    self.on_connect_result(attempt, result).await;
                }
                event = next_event(&mut self.transport) => {
                    self.on_transport_event(event).await;
                }
                Some(event) = self.pipeline_rx.recv() => self.on_pipeline_event(event),
                _ = sleep_until(self.deadline) => self.on_heartbeat_timeout().await,
                _ = sleep_until(self.stop_at) => {
                    self.stop_at = None;
                    self.disconnect().await;
                }
            }
        }

        // Every handle is gone.
        if self.phase.is_live() || self.phase == SessionPhase::Closing {
            self.teardown().await;
        }
        debug!("session actor exited");
    }

    // ── Commands ─────────────────────────────────────────────────

    async fn on_command(&mut self, command: Command) {
        trace!(?command, phase = %self.phase, "command");
        match command {
            Command::Start {
                address,
                token,
                ack,
            } => {
                let _ = ack.send(self.start(address, token));
            }
            Command::Reconnect { ack } => {
                let _ = ack.send(self.reconnect());
            }
            Command::Stop { ack } => {
                let _ = ack.send(self.stop());
            }
            Command::Disconnect { ack } => {
                let _ = ack.send(self.disconnect().await);
            }
            Command::SendTouch { batch, ack } => {
                let _ = ack.send(self.send_touch(batch));
            }
        }
    }

    fn start(&mut self, address: DeviceAddress, token: String) -> bool {
        if let Err(e) = self.config.validate() {
            warn!("start rejected: {e}");
            return false;
        }
        if let Err(e) = self.phase.begin_connect() {
            debug!("start ignored: {e}");
            return false;
        }
        info!(%address, "starting session");
        self.target = Some((address, token));
        self.reconnecting = false;
        self.reported.clear();
        self.spawn_connect();
        self.publish();
        true
    }

    fn reconnect(&mut self) -> bool {
        if self.target.is_none() {
            return false;
        }
        if let Err(e) = self.phase.begin_reconnect() {
            debug!("reconnect ignored: {e}");
            return false;
        }
        info!("reconnecting");
        self.reconnecting = true;
        self.reported.clear();
        self.spawn_connect();
        self.publish();
        true
    }

    fn stop(&mut self) -> bool {
        let was_connected = self.phase.is_connected();
        if let Err(e) = self.phase.begin_stop() {
            debug!("stop ignored: {e}");
            return false;
        }
        self.muted = true;
        self.reconnecting = false;

        if self.phase == SessionPhase::Closed {
            // Never started: nothing to tear down.
            info!("session closed before start");
            self.publish();
            return true;
        }

        if was_connected {
            match StopRequest::default().into_message() {
                Ok(message) => self.send(message),
                Err(e) => warn!("cannot build stop request: {e}"),
            }
        }
        self.deadline = None;
        self.stop_at = Some(Instant::now() + self.config.stop_grace());
        info!(grace = ?self.config.stop_grace(), "stopping session");
        self.publish();
        true
    }

    /// Tear down whatever connection exists. No-op when there is none.
    async fn disconnect(&mut self) -> bool {
        if !(self.phase.is_live() || self.phase == SessionPhase::Closing) {
            return false;
        }
        self.teardown().await;
        self.emit(SessionEvent::Closed(CloseReason::Local));
        true
    }

    fn send_touch(&mut self, batch: String) -> bool {
        if !self.phase.is_connected() {
            trace!("touch dropped: not connected");
            return false;
        }
        match &self.transport {
            Some(transport) => transport.send(Message::touch(batch)).is_ok(),
            None => false,
        }
    }

    // ── Connection ───────────────────────────────────────────────

    fn spawn_connect(&mut self) {
        let Some((address, _)) = self.target.clone() else {
            return;
        };
        self.attempt += 1;
        let attempt = self.attempt;
        let timeout = self.config.connect_timeout();
        let results = self.connect_tx.clone();
        self.connecting = Some(tokio::spawn(async move {
            let result = Transport::connect(&address, timeout).await;
            let _ = results.send((attempt, result));
        }));
    }

    async fn on_connect_result(&mut self, attempt: u64, result: Result<Transport, ArpError>) {
        self.connecting = None;
        if attempt != self.attempt || self.phase != SessionPhase::Connecting {
            if let Ok(stale) = result {
                debug!(peer = %stale.peer_addr(), "discarding stale connection");
                stale.close().await;
            }
            return;
        }

        let mut transport = match result {
            Ok(t) => t,
            Err(e) => {
                warn!("connect failed: {e}");
                self.fail(&e).await;
                return;
            }
        };

        if let Err(e) = self.phase.complete_connect() {
            warn!("unexpected connect completion: {e}");
            transport.close().await;
            return;
        }
        info!(peer = %transport.peer_addr(), "connected");

        transport.start_heartbeat(self.config.heartbeat_interval());
        self.transport = Some(transport);
        self.reconnecting = false;
        self.deadline = Some(Instant::now() + self.config.heartbeat_timeout());

        if let Some((_, token)) = &self.target {
            let request = ConnectRequest::new(
                token.clone(),
                self.config.package_name.clone(),
                self.config.quality,
            );
            match request.into_message() {
                Ok(message) => self.send(message),
                Err(e) => warn!("cannot build connect request: {e}"),
            }
        }
        self.send(Message::time(unix_millis()));

        self.publish();
        self.emit(SessionEvent::Connected);

        if let Err(e) = self.player.start_audio() {
            self.report(&e);
        }
    }

    fn send(&self, message: Message) {
        match &self.transport {
            Some(transport) => {
                if let Err(e) = transport.send(message) {
                    debug!("send dropped: {e}");
                }
            }
            None => debug!("send dropped: no transport"),
        }
    }

    /// Close the transport, stop media, and settle the phase.
    async fn teardown(&mut self) {
        let uptime = self.phase.connected_duration();
        self.attempt += 1;
        if let Some(connecting) = self.connecting.take() {
            connecting.abort();
        }
        self.deadline = None;
        self.stop_at = None;

        if let Some(transport) = self.transport.take() {
            transport.close().await;
        }
        self.player.stop().await;
        // Reports from pipelines that no longer exist.
        while self.pipeline_rx.try_recv().is_ok() {}

        self.touch_setting = None;
        self.video_info = None;
        self.mapping.send_replace(None);

        if let Err(e) = self.phase.finish_disconnect() {
            debug!("teardown: {e}");
        }
        self.reconnecting = false;
        self.publish();
        info!(phase = %self.phase, ?uptime, "connection torn down");
    }

    /// Lose the connection because of `error`.
    async fn fail(&mut self, error: &ArpError) {
        if self.phase.is_stopped() {
            // Already on the way out; finish quietly.
            self.disconnect().await;
            return;
        }
        self.teardown().await;
        self.report(error);
    }

    // ── Inbound ──────────────────────────────────────────────────

    async fn on_transport_event(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::Frame(message)) => {
                if self.deadline.is_some() {
                    self.deadline = Some(Instant::now() + self.config.heartbeat_timeout());
                }
                self.dispatch(message).await;
            }
            Some(TransportEvent::Closed) => {
                if self.phase.is_stopped() {
                    self.disconnect().await;
                } else {
                    info!("device closed the connection");
                    self.teardown().await;
                    self.emit(SessionEvent::Closed(CloseReason::Peer));
                }
            }
            Some(TransportEvent::Failed(e)) => {
                warn!("transport failed: {e}");
                self.fail(&e).await;
            }
            None => self.fail(&ArpError::ChannelClosed).await,
        }
    }

    async fn on_heartbeat_timeout(&mut self) {
        let timeout = self.config.heartbeat_timeout();
        warn!(?timeout, "no data from device");
        self.fail(&ArpError::HeartbeatTimeout(timeout)).await;
    }

    async fn dispatch(&mut self, message: Message) {
        match message.message_type() {
            Some(MessageType::Protocol) => match parse_control(message.payload()) {
                Ok(Some(control)) => self.on_control(control).await,
                Ok(None) => trace!("ignoring unrecognised control payload"),
                Err(e) => {
                    warn!("bad control message: {e}");
                    self.report(&e);
                }
            },
            Some(MessageType::Video) => self.on_media(MediaKind::Video, message),
            Some(MessageType::Audio) => self.on_media(MediaKind::Audio, message),
            Some(MessageType::Heartbeat) => trace!("heartbeat"),
            other => trace!(kind = ?other, "ignoring frame"),
        }
    }

    fn on_media(&mut self, kind: MediaKind, message: Message) {
        if !self.phase.is_connected() {
            return;
        }
        match AvPacket::from_message(message) {
            Ok(packet) => self.player.push(kind, packet),
            Err(e) => warn!(%kind, "dropping media frame: {e}"),
        }
    }

    async fn on_control(&mut self, control: ControlMessage) {
        if !self.phase.is_connected() {
            trace!(phase = %self.phase, "control message ignored");
            return;
        }
        match control {
            ControlMessage::ConnectResponse { result: 0 } => debug!("connect accepted"),
            ControlMessage::ConnectResponse { result } => {
                warn!(result, "connect refused");
                self.report(&ArpError::ConnectionRefused(result));
            }
            ControlMessage::TouchSetting(setting) => {
                debug!(?setting, "touch setting");
                self.touch_setting = Some(setting);
                self.update_mapping();
            }
            ControlMessage::VideoInfo(info) => self.on_video_info(info).await,
        }
    }

    async fn on_video_info(&mut self, info: VideoInfo) {
        info!(
            width = info.width,
            height = info.height,
            resolution = %format!("{}x{}", info.resolution_width, info.resolution_height),
            "video info"
        );
        self.video_info = Some(info);
        self.update_mapping();

        // Positive dimensions are checked when the message is parsed.
        let width = info.width.unsigned_abs();
        let height = info.height.unsigned_abs();
        if let Err(e) = self.player.configure_video(width, height).await {
            self.report(&e);
            return;
        }
        self.emit(SessionEvent::Prepared(info));
    }

    fn update_mapping(&mut self) {
        let (Some(setting), Some(info)) = (self.touch_setting, self.video_info) else {
            return;
        };
        let area = info.display_rect(self.config.view_width, self.config.view_height);
        let mapping = TouchMapping::new(setting, area, info.status_bar_height, info.virtual_bar_height);
        debug!(?area, "touch mapping updated");
        self.mapping.send_replace(Some(Arc::new(mapping)));
    }

    fn on_pipeline_event(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::FirstFrame(kind) => self.emit(SessionEvent::FirstFrame(kind)),
            PipelineEvent::Failed(_, e) => self.report(&e),
        }
    }

    // ── Owner notifications ──────────────────────────────────────

    fn report(&mut self, error: &ArpError) {
        let error = SessionError::from(error);
        if self.muted {
            debug!(%error, "error after stop suppressed");
            return;
        }
        if !self.reported.insert(error.code) {
            debug!(%error, "error already reported for this attempt");
            return;
        }
        self.emit(SessionEvent::Error(error));
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            trace!("event receiver dropped");
        }
    }

    fn publish(&self) {
        self.status.send_replace(SessionStatus {
            phase: self.phase.clone(),
            reconnecting: self.reconnecting,
        });
    }
}

async fn next_event(transport: &mut Option<Transport>) -> Option<TransportEvent> {
    match transport {
        Some(t) => t.recv().await,
        None => pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => pending().await,
    }
}

fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
