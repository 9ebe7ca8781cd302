//! TCP transport for one device session.
//!
//! The socket is wrapped in a [`Framed`] [`MessageCodec`] and split into
//! independent read and write loops. Outbound messages go through an
//! unbounded queue so the session never waits on the socket; inbound frames
//! and connection events come back through [`Transport::recv`] in wire
//! order.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

use crate::codec::MessageCodec;
use crate::error::ArpError;
use crate::message::Message;
use crate::network::DeviceAddress;
use crate::task::TaskGroup;

/// Inbound event channel depth. The read loop waits when the session falls
/// this far behind.
const EVENT_QUEUE_DEPTH: usize = 256;

/// Upper bound on flushing queued writes when the transport closes.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

// ── TransportEvent ───────────────────────────────────────────────

/// What the read and write loops report to the session.
#[derive(Debug)]
pub enum TransportEvent {
    /// A complete inbound frame.
    Frame(Message),
    /// The peer closed the stream cleanly.
    Closed,
    /// The socket or the framing failed.
    Failed(ArpError),
}

// ── Transport ────────────────────────────────────────────────────

/// A connected device socket with its read, write and heartbeat loops.
#[derive(Debug)]
pub struct Transport {
    // Messages to the background writer
    tx: mpsc::UnboundedSender<Message>,
    // Events from the background reader/writer
    rx: mpsc::Receiver<TransportEvent>,
    tasks: TaskGroup,
    peer: SocketAddr,
}

impl Transport {
    /// Open a TCP connection to the device.
    pub async fn connect(address: &DeviceAddress, timeout: Duration) -> Result<Self, ArpError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(address.to_string()))
            .await
            .map_err(|_| ArpError::Timeout(timeout))??;
        stream.set_nodelay(true)?;
        Self::new(stream)
    }

    /// Take ownership of an established stream and start the I/O loops.
    pub fn new(stream: TcpStream) -> Result<Self, ArpError> {
        let peer = stream.peer_addr()?;
        let (mut net_writer, mut net_reader) = Framed::new(stream, MessageCodec::new()).split();

        // Session -> Network
        let (user_tx, mut network_rx) = mpsc::unbounded_channel::<Message>();

        // Network -> Session
        let (event_tx, user_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

        let mut tasks = TaskGroup::new("transport");

        // Writer loop: Session -> Network
        let writer_events = event_tx.clone();
        tasks.spawn("writer", move |cancel| async move {
            loop {
                let message = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    next = network_rx.recv() => match next {
                        Some(m) => m,
                        None => break,
                    },
                };
                trace!(kind = ?message.message_type(), len = message.frame_len(), "send");
                if let Err(e) = net_writer.send(message).await {
                    debug!("network write error: {e}");
                    let _ = writer_events.try_send(TransportEvent::Failed(e));
                    return;
                }
            }

            // Flush whatever was queued before the close request, then
            // shut the write half down.
            let flush = async {
                while let Ok(message) = network_rx.try_recv() {
                    net_writer.feed(message).await?;
                }
                net_writer.close().await
            };
            match tokio::time::timeout(FLUSH_TIMEOUT, flush).await {
                Ok(Err(e)) => debug!("flush on close failed: {e}"),
                Err(_) => debug!("flush on close timed out"),
                Ok(Ok(())) => {}
            }
        });

        // Reader loop: Network -> Session
        tasks.spawn("reader", move |cancel| async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    next = net_reader.next() => match next {
                        Some(Ok(message)) => TransportEvent::Frame(message),
                        Some(Err(e)) => TransportEvent::Failed(e),
                        None => TransportEvent::Closed,
                    },
                };
                let terminal = !matches!(event, TransportEvent::Frame(_));
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    sent = event_tx.send(event) => {
                        if sent.is_err() {
                            // Session side dropped, stop reading
                            break;
                        }
                    }
                }
                if terminal {
                    break;
                }
            }
        });

        debug!(%peer, "transport started");
        Ok(Self {
            tx: user_tx,
            rx: user_rx,
            tasks,
            peer,
        })
    }

    /// Start sending a heartbeat every `interval`, the first one immediately.
    pub fn start_heartbeat(&mut self, interval: Duration) {
        let heartbeat_tx = self.tx.clone();
        self.tasks.spawn("heartbeat", move |cancel| async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if heartbeat_tx.send(Message::heartbeat()).is_err() {
                            break; // Writer is gone, stop heartbeat
                        }
                    }
                }
            }
        });
    }

    /// Queue a message for the writer loop.
    pub fn send(&self, message: Message) -> Result<(), ArpError> {
        self.tx.send(message).map_err(|_| {
            warn!(peer = %self.peer, "write after writer stopped");
            ArpError::ChannelClosed
        })
    }

    /// Next inbound event; `None` once every loop has stopped.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Stop every loop, flush queued writes and release the socket.
    ///
    /// When this returns no further events are produced.
    pub async fn close(mut self) {
        self.tasks.shutdown().await;
        self.rx.close();
        debug!(peer = %self.peer, "transport closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageType;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn pair() -> (Transport, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let address = DeviceAddress::new(addr.ip().to_string(), addr.port());
        let connect = tokio::spawn(async move {
            Transport::connect(&address, Duration::from_secs(5)).await.unwrap()
        });
        let (device, _) = listener.accept().await.unwrap();
        (connect.await.unwrap(), device)
    }

    #[tokio::test]
    async fn frames_arrive_in_wire_order() {
        let (mut transport, mut device) = pair().await;

        let mut wire = Vec::new();
        wire.extend_from_slice(&[0, 0, 0, 0]);
        wire.extend_from_slice(&[0, 0, 0, 3, 3, b'{', b'}']);
        wire.extend_from_slice(&[0, 0, 0, 1, 1]);
        device.write_all(&wire).await.unwrap();

        let mut kinds = Vec::new();
        for _ in 0..3 {
            match transport.recv().await.unwrap() {
                TransportEvent::Frame(m) => kinds.push(m.message_type()),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(
            kinds,
            vec![
                Some(MessageType::Heartbeat),
                Some(MessageType::Protocol),
                Some(MessageType::Audio)
            ]
        );
        transport.close().await;
    }

    #[tokio::test]
    async fn peer_close_is_reported() {
        let (mut transport, device) = pair().await;
        drop(device);
        let event = tokio::time::timeout(Duration::from_secs(5), transport.recv())
            .await
            .unwrap();
        assert!(matches!(event, Some(TransportEvent::Closed)));
        transport.close().await;
    }

    #[tokio::test]
    async fn queued_writes_reach_device_on_close() {
        let (transport, mut device) = pair().await;
        transport.send(Message::touch("u 0 \nc\n".into())).unwrap();
        transport.close().await;

        let mut buf = Vec::new();
        device.read_to_end(&mut buf).await.unwrap();
        assert_eq!(&buf[..4], &[0, 0, 0, 8]);
        assert_eq!(buf[4], 2);
        assert_eq!(&buf[5..], b"u 0 \nc\n");
    }

    #[tokio::test]
    async fn heartbeat_is_sent_immediately() {
        let (mut transport, mut device) = pair().await;
        transport.start_heartbeat(Duration::from_secs(60));
        let mut buf = [0xFFu8; 4];
        tokio::time::timeout(Duration::from_secs(5), device.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(buf, [0, 0, 0, 0]);
        transport.close().await;
    }

    #[tokio::test]
    async fn connect_refused_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let address = DeviceAddress::new(addr.ip().to_string(), addr.port());
        let err = Transport::connect(&address, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ArpError::Connection(_)));
    }
}
