// JSON-over-UDP transport speaking to a broker bridge.
// Invariants: at most one active session; its background tasks die with it.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::constants::{DATAGRAM_MAX_LEN, OPERATION_TIMEOUT_MS};
use crate::transport::{ConnectOptions, SessionId, Transport, TransportError, TransportEvent};
use crate::utils::monotonic_ms;

const ACK_QUEUE_CAPACITY: usize = 8;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WillEnvelope {
    pub topic: String,
    pub payload: String,
}

/// Wire envelope, one per datagram.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    Connect {
        client_id: String,
        keep_alive_secs: u64,
        will: WillEnvelope,
    },
    Connack {
        accepted: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Publish {
        topic: String,
        payload: String,
    },
    Subscribe {
        topic: String,
    },
    Suback {
        topic: String,
        granted: bool,
    },
    Pingreq,
    Pingresp,
    Disconnect,
}

impl Envelope {
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

struct ActiveSession {
    id: SessionId,
    socket: Arc<UdpSocket>,
    acks: mpsc::Receiver<Envelope>,
    tasks: Vec<JoinHandle<()>>,
}

impl ActiveSession {
    async fn close(self) {
        if let Err(err) = send(&self.socket, &Envelope::Disconnect).await {
            debug!(?err, session = %self.id, "disconnect notice not delivered");
        }
        for task in self.tasks {
            task.abort();
        }
    }
}

pub struct DatagramTransport {
    broker: SocketAddr,
    operation_timeout: Duration,
    events: mpsc::Sender<TransportEvent>,
    next_session: AtomicU64,
    session: Mutex<Option<ActiveSession>>,
}

impl DatagramTransport {
    pub fn new(broker: SocketAddr, events: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            broker,
            operation_timeout: Duration::from_millis(OPERATION_TIMEOUT_MS),
            events,
            next_session: AtomicU64::new(0),
            session: Mutex::new(None),
        }
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    fn local_bind(&self) -> SocketAddr {
        match self.broker {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        }
    }

    async fn await_connack(&self, socket: &UdpSocket) -> Result<(bool, Option<String>), TransportError> {
        let mut buf = vec![0u8; DATAGRAM_MAX_LEN];
        let wait = async {
            loop {
                let len = socket.recv(&mut buf).await?;
                match Envelope::decode(&buf[..len]) {
                    Ok(Envelope::Connack { accepted, reason }) => {
                        return Ok::<_, TransportError>((accepted, reason));
                    }
                    Ok(other) => debug!(?other, "ignoring datagram before connack"),
                    Err(err) => debug!(?err, "malformed datagram before connack"),
                }
            }
        };
        time::timeout(self.operation_timeout, wait)
            .await
            .map_err(|_| TransportError::Timeout("connack"))?
    }
}

async fn send(socket: &UdpSocket, envelope: &Envelope) -> Result<(), TransportError> {
    let bytes = envelope.encode()?;
    socket.send(&bytes).await?;
    Ok(())
}

async fn receive_loop(
    socket: Arc<UdpSocket>,
    session: SessionId,
    events: mpsc::Sender<TransportEvent>,
    acks: mpsc::Sender<Envelope>,
    last_seen_ms: Arc<AtomicU64>,
    start: Instant,
) {
    let mut buf = vec![0u8; DATAGRAM_MAX_LEN];
    loop {
        let len = match socket.recv(&mut buf).await {
            Ok(len) => len,
            Err(err) => {
                warn!(?err, %session, "datagram receive failed");
                let _ = events.send(TransportEvent::Disconnected { session }).await;
                return;
            }
        };
        last_seen_ms.store(monotonic_ms(start), Ordering::Relaxed);
        match Envelope::decode(&buf[..len]) {
            Ok(Envelope::Publish { topic, payload }) => {
                let message = TransportEvent::Message {
                    topic,
                    payload: payload.into_bytes(),
                };
                if events.send(message).await.is_err() {
                    return;
                }
            }
            Ok(ack @ Envelope::Suback { .. }) => {
                if acks.try_send(ack).is_err() {
                    debug!(%session, "suback with no waiter");
                }
            }
            Ok(Envelope::Pingresp) => {}
            Ok(Envelope::Disconnect) => {
                info!(%session, "broker closed session");
                let _ = events.send(TransportEvent::Disconnected { session }).await;
                return;
            }
            Ok(other) => debug!(?other, "unexpected envelope"),
            Err(err) => warn!(?err, "malformed datagram"),
        }
    }
}

async fn keep_alive_loop(
    socket: Arc<UdpSocket>,
    session: SessionId,
    events: mpsc::Sender<TransportEvent>,
    last_seen_ms: Arc<AtomicU64>,
    start: Instant,
    keep_alive: Duration,
) {
    let silence_limit_ms = keep_alive.as_millis() as u64 * 3 / 2;
    let mut interval = time::interval(keep_alive);
    interval.tick().await;
    loop {
        interval.tick().await;
        let silent_ms = monotonic_ms(start).saturating_sub(last_seen_ms.load(Ordering::Relaxed));
        if silent_ms > silence_limit_ms {
            warn!(%session, silent_ms, "keep-alive expired");
            let _ = events.send(TransportEvent::Disconnected { session }).await;
            return;
        }
        if let Err(err) = send(&socket, &Envelope::Pingreq).await {
            warn!(?err, %session, "pingreq failed");
            let _ = events.send(TransportEvent::Disconnected { session }).await;
            return;
        }
    }
}

#[async_trait]
impl Transport for DatagramTransport {
    async fn connect(&self, options: &ConnectOptions) -> Result<SessionId, TransportError> {
        let mut guard = self.session.lock().await;
        if let Some(previous) = guard.take() {
            previous.close().await;
        }

        let socket = UdpSocket::bind(self.local_bind()).await?;
        socket.connect(self.broker).await?;
        let connect = Envelope::Connect {
            client_id: options.client_id.clone(),
            keep_alive_secs: options.keep_alive.as_secs(),
            will: WillEnvelope {
                topic: options.will.topic.clone(),
                payload: options.will.payload.clone(),
            },
        };
        send(&socket, &connect).await?;

        let (accepted, reason) = self.await_connack(&socket).await?;
        if !accepted {
            return Err(TransportError::Rejected(
                reason.unwrap_or_else(|| "connect refused".to_string()),
            ));
        }

        let id = SessionId(self.next_session.fetch_add(1, Ordering::Relaxed) + 1);
        let socket = Arc::new(socket);
        let start = Instant::now();
        let last_seen_ms = Arc::new(AtomicU64::new(0));
        let (ack_tx, ack_rx) = mpsc::channel(ACK_QUEUE_CAPACITY);

        let receiver = tokio::spawn(receive_loop(
            socket.clone(),
            id,
            self.events.clone(),
            ack_tx,
            last_seen_ms.clone(),
            start,
        ));
        let keep_alive = tokio::spawn(keep_alive_loop(
            socket.clone(),
            id,
            self.events.clone(),
            last_seen_ms,
            start,
            options.keep_alive,
        ));

        info!(broker = %self.broker, session = %id, "session established");
        *guard = Some(ActiveSession {
            id,
            socket,
            acks: ack_rx,
            tasks: vec![receiver, keep_alive],
        });
        Ok(id)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if let Some(session) = self.session.lock().await.take() {
            info!(session = %session.id, "closing session");
            session.close().await;
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or(TransportError::NotConnected)?;
        let envelope = Envelope::Publish {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        };
        send(&session.socket, &envelope).await
    }

    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(TransportError::NotConnected)?;
        send(
            &session.socket,
            &Envelope::Subscribe {
                topic: topic.to_string(),
            },
        )
        .await?;

        let acks = &mut session.acks;
        let wait = async {
            while let Some(envelope) = acks.recv().await {
                if let Envelope::Suback { topic: acked, granted } = envelope {
                    if acked == topic {
                        return Ok(granted);
                    }
                }
            }
            Err(TransportError::NotConnected)
        };
        let granted = time::timeout(self.operation_timeout, wait)
            .await
            .map_err(|_| TransportError::Timeout("suback"))??;
        if granted {
            Ok(())
        } else {
            Err(TransportError::Rejected(format!("subscription to {topic} refused")))
        }
    }
}
