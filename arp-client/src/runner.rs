//! Session driver: connect, log what the device does, reconnect on
//! transport loss, and stop cleanly on shutdown.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use arp_core::{
    ArpError, CloseReason, DeviceAddress, ErrorCode, Session, SessionEvent, SessionPhase,
};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::config::{ClientConfig, ReconnectConfig};
use crate::sink::{CountingDecoderFactory, StatsSnapshot};

/// Extra time allowed past the stop grace delay for the session to close.
const CLOSE_SLACK: Duration = Duration::from_secs(1);

/// Tracks consecutive reconnect attempts against the configured policy.
struct Retry {
    policy: ReconnectConfig,
    attempts: u32,
    at: Option<Instant>,
}

impl Retry {
    fn new(policy: ReconnectConfig) -> Self {
        Self {
            policy,
            attempts: 0,
            at: None,
        }
    }

    /// Arm the retry timer. Returns `false` once the policy is exhausted.
    fn schedule(&mut self) -> bool {
        if !self.policy.enabled || self.attempts >= self.policy.max_attempts {
            return false;
        }
        if self.at.is_none() {
            self.attempts += 1;
            self.at = Some(Instant::now() + Duration::from_millis(self.policy.delay_ms));
            info!(
                attempt = self.attempts,
                max = self.policy.max_attempts,
                delay_ms = self.policy.delay_ms,
                "reconnect scheduled"
            );
        }
        true
    }

    fn reset(&mut self) {
        self.attempts = 0;
        self.at = None;
    }
}

/// Run one session until `shutdown` resolves or the device is lost for good.
///
/// Returns the media counters on a clean exit, or the error that ended the
/// session.
pub async fn run(
    config: ClientConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<StatsSnapshot, ArpError> {
    config.session.validate()?;
    let address: DeviceAddress = config.network.device_address.parse()?;
    let factory = Arc::new(CountingDecoderFactory::new());
    let stats = factory.stats();

    let (session, mut events) = Session::new(config.session.clone(), factory);
    info!(%address, "connecting");
    if !session
        .start(address, config.network.session_token.clone())
        .await
    {
        return Err(ArpError::Other("session refused to start".into()));
    }

    let mut retry = Retry::new(config.reconnect.clone());
    tokio::pin!(shutdown);

    let outcome = loop {
        tokio::select! {
            _ = &mut shutdown => break Ok(()),
            _ = wait(retry.at) => {
                retry.at = None;
                if !session.reconnect().await {
                    break Err(ArpError::Other("reconnect rejected".into()));
                }
            }
            event = events.recv() => {
                let Some(event) = event else {
                    break Err(ArpError::ChannelClosed);
                };
                match event {
                    SessionEvent::Connected => {
                        info!("connected");
                        retry.reset();
                    }
                    SessionEvent::Prepared(video) => {
                        info!(
                            width = video.width,
                            height = video.height,
                            resolution_width = video.resolution_width,
                            resolution_height = video.resolution_height,
                            "video prepared"
                        );
                    }
                    SessionEvent::FirstFrame(kind) => info!(%kind, "first frame"),
                    SessionEvent::Closed(CloseReason::Local) => debug!("closed locally"),
                    SessionEvent::Closed(CloseReason::Peer) => {
                        warn!("device closed the connection");
                        if !retry.schedule() {
                            break Err(ArpError::ClosedByPeer);
                        }
                    }
                    SessionEvent::Error(e) if e.code == ErrorCode::ConnectionRefusedVersion => {
                        error!(error = %e, "device refused the session");
                        break Err(ArpError::Other(e.to_string()));
                    }
                    SessionEvent::Error(e) => {
                        warn!(error = %e, "session error");
                        if e.code.is_transport()
                            && session.phase() == SessionPhase::Disconnected
                            && !retry.schedule()
                        {
                            break Err(ArpError::Other(format!(
                                "giving up after {} reconnect attempts: {e}",
                                retry.attempts
                            )));
                        }
                    }
                }
            }
        }
    };

    close(&session, &config).await;
    let snapshot = stats.snapshot();
    outcome.map(|()| snapshot)
}

/// Stop the session and wait for the grace delay to run out.
async fn close(session: &Session, config: &ClientConfig) {
    if !session.stop().await {
        session.disconnect().await;
        return;
    }
    let mut status = session.subscribe();
    let closed = tokio::time::timeout(
        config.session.stop_grace() + CLOSE_SLACK,
        status.wait_for(|s| s.phase == SessionPhase::Closed),
    )
    .await;
    match closed {
        Ok(Ok(_)) => debug!("session closed"),
        _ => warn!("session did not close in time"),
    }
}

async fn wait(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use arp_core::{Message, MessageCodec, MessageType};
    use futures::{SinkExt, StreamExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;
    use tokio_util::codec::Framed;

    type Device = Framed<TcpStream, MessageCodec>;

    fn test_config(address: String) -> ClientConfig {
        let mut config = ClientConfig::default();
        config.network.device_address = address;
        config.network.session_token = "token".into();
        config.session.stop_grace_ms = 50;
        config.reconnect.delay_ms = 10;
        config
    }

    async fn accept(listener: &TcpListener) -> Device {
        let (stream, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
            .await
            .expect("timeout")
            .unwrap();
        Framed::new(stream, MessageCodec::new())
    }

    async fn protocol_frame(device: &mut Device) -> Message {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let message = device.next().await.unwrap().unwrap();
                if message.message_type() == Some(MessageType::Protocol) {
                    return message;
                }
            }
        })
        .await
        .expect("timeout")
    }

    #[tokio::test]
    async fn shutdown_sends_stop_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = test_config(listener.local_addr().unwrap().to_string());
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(run(config, async move {
            let _ = stop_rx.await;
        }));

        let mut device = accept(&listener).await;
        let connect = protocol_frame(&mut device).await;
        assert!(std::str::from_utf8(connect.payload()).unwrap().contains("\"id\":1"));

        stop_tx.send(()).unwrap();
        let stop = protocol_frame(&mut device).await;
        assert_eq!(stop.payload(), br#"{"id":2}"#);

        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats, StatsSnapshot::default());
    }

    #[tokio::test]
    async fn refused_session_ends_the_run() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = test_config(listener.local_addr().unwrap().to_string());

        let handle = tokio::spawn(run(config, pending()));

        let mut device = accept(&listener).await;
        protocol_frame(&mut device).await;
        device
            .send(Message::protocol(br#"{"id":103,"result":1}"#.to_vec()))
            .await
            .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("timeout")
            .unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unreachable_device_without_reconnect_exits() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut config = test_config(address);
        config.reconnect.enabled = false;

        let result = tokio::time::timeout(Duration::from_secs(5), run(config, pending()))
            .await
            .expect("timeout");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reconnect_attempts_are_bounded() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut config = test_config(address);
        config.reconnect.max_attempts = 2;

        let result = tokio::time::timeout(Duration::from_secs(5), run(config, pending()))
            .await
            .expect("timeout");
        match result {
            Err(ArpError::Other(message)) => assert!(message.contains("2 reconnect attempts")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_session_config_is_rejected() {
        let mut config = test_config("127.0.0.1:9".into());
        config.session.heartbeat_interval_ms = 0;

        let result = run(config, pending()).await;
        assert!(matches!(result, Err(ArpError::InvalidConfig(_))));
    }

    #[test]
    fn retry_policy_is_bounded() {
        let mut retry = Retry::new(ReconnectConfig {
            enabled: true,
            delay_ms: 0,
            max_attempts: 1,
        });
        assert!(retry.schedule());
        assert!(retry.at.is_some());
        retry.at = None;
        assert!(!retry.schedule());
        retry.reset();
        assert!(retry.schedule());
    }
}
