// Transport supervisor: link association, session establishment, recovery, and halt.
// Invariants: sole writer of the connection state; exactly one subscribe cycle per established session.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, error, info, warn};

use presence_core::connection::{ConnectionEvent, ConnectionState, ConnectionTracker, ConnectionTransition};
use presence_core::payload::{self, PayloadError};
use presence_core::topics::Topics;

use crate::app::{InboundMessage, PublisherCommand};
use crate::buffers::RingBuffer;
use crate::constants::{
    KEEP_ALIVE_SECS, LINK_RETRIES, LINK_RETRY_INTERVAL_MS, SESSION_RETRIES, SESSION_RETRY_INTERVAL_MS,
    SUBSCRIBE_RETRIES, SUBSCRIBE_RETRY_INTERVAL_MS, TRANSITION_HISTORY_CAP,
};
use crate::transport::{ConnectOptions, LastWill, Link, SessionId, Transport, TransportEvent};

#[derive(Clone, Debug, PartialEq)]
pub struct SupervisorSettings {
    pub link_retries: u32,
    pub link_retry_interval: Duration,
    pub session_retries: u32,
    pub session_retry_interval: Duration,
    pub subscribe_retries: u32,
    pub subscribe_retry_interval: Duration,
    pub keep_alive: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            link_retries: LINK_RETRIES,
            link_retry_interval: Duration::from_millis(LINK_RETRY_INTERVAL_MS),
            session_retries: SESSION_RETRIES,
            session_retry_interval: Duration::from_millis(SESSION_RETRY_INTERVAL_MS),
            subscribe_retries: SUBSCRIBE_RETRIES,
            subscribe_retry_interval: Duration::from_millis(SUBSCRIBE_RETRY_INTERVAL_MS),
            keep_alive: Duration::from_secs(KEEP_ALIVE_SECS),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryStage {
    Link,
    Session,
}

impl std::fmt::Display for RetryStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryStage::Link => f.write_str("link association"),
            RetryStage::Session => f.write_str("session"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("{stage} retries exhausted after {attempts} attempts")]
    RetriesExhausted { stage: RetryStage, attempts: u32 },
    #[error("last-will payload could not be encoded: {0}")]
    LastWill(#[from] PayloadError),
}

/// Channels the supervisor drives.
pub struct SupervisorChannels {
    pub state_tx: watch::Sender<ConnectionState>,
    /// Recent transitions, oldest first.
    pub history_tx: watch::Sender<Vec<ConnectionTransition>>,
    pub publisher_tx: mpsc::Sender<PublisherCommand>,
    pub inbound_tx: mpsc::Sender<InboundMessage>,
    pub events: mpsc::Receiver<TransportEvent>,
}

pub struct Supervisor {
    link: Arc<dyn Link>,
    transport: Arc<dyn Transport>,
    topics: Topics,
    client_id: String,
    settings: SupervisorSettings,
    channels: SupervisorChannels,
    tracker: ConnectionTracker,
    session: Option<SessionId>,
    history: RingBuffer<ConnectionTransition>,
}

impl Supervisor {
    pub fn new(
        link: Arc<dyn Link>,
        transport: Arc<dyn Transport>,
        topics: Topics,
        client_id: impl Into<String>,
        settings: SupervisorSettings,
        channels: SupervisorChannels,
    ) -> Self {
        Self {
            link,
            transport,
            topics,
            client_id: client_id.into(),
            settings,
            channels,
            tracker: ConnectionTracker::new(),
            session: None,
            history: RingBuffer::new(TRANSITION_HISTORY_CAP),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.tracker.state()
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    fn transition(&mut self, event: ConnectionEvent) {
        match self.tracker.apply(event) {
            Ok(transition) => {
                info!(from = transition.from.as_str(), to = transition.to.as_str(), "connection state");
                self.history.push(transition);
                self.channels.history_tx.send_replace(self.history.to_vec_ordered());
                self.channels.state_tx.send_replace(transition.to);
            }
            Err(err) => warn!(%err, "connection transition ignored"),
        }
    }

    fn halt(&mut self, stage: RetryStage, attempts: u32) -> SupervisorError {
        error!(%stage, attempts, "retries exhausted, halting");
        self.transition(ConnectionEvent::RetriesExhausted);
        SupervisorError::RetriesExhausted { stage, attempts }
    }

    async fn associate_link(&mut self) -> Result<(), SupervisorError> {
        let retries = self.settings.link_retries;
        for attempt in 1..=retries {
            match self.link.associate().await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(?err, attempt, retries, "link association failed");
                    if attempt < retries {
                        time::sleep(self.settings.link_retry_interval).await;
                    }
                }
            }
        }
        Err(self.halt(RetryStage::Link, retries))
    }

    fn connect_options(&self) -> Result<ConnectOptions, SupervisorError> {
        Ok(ConnectOptions {
            client_id: self.client_id.clone(),
            keep_alive: self.settings.keep_alive,
            will: LastWill {
                topic: self.topics.last_will.clone(),
                payload: payload::last_will()?,
            },
        })
    }

    async fn subscribe_control(&self) {
        let topic = &self.topics.property_subscribe;
        let retries = self.settings.subscribe_retries;
        for attempt in 1..=retries {
            match self.transport.subscribe(topic).await {
                Ok(()) => {
                    info!(%topic, "subscribed");
                    return;
                }
                Err(err) => {
                    warn!(?err, attempt, retries, %topic, "subscribe failed");
                    if attempt < retries {
                        time::sleep(self.settings.subscribe_retry_interval).await;
                    }
                }
            }
        }
        error!(%topic, "giving up on subscription for this session");
    }

    async fn notify_publisher(&self, command: PublisherCommand) {
        if self.channels.publisher_tx.send(command).await.is_err() {
            warn!("publisher stopped");
        }
    }

    /// Runs the session retry loop until a session is up.
    pub async fn establish(&mut self) -> Result<SessionId, SupervisorError> {
        let retries = self.settings.session_retries;
        for attempt in 1..=retries {
            if !self.link.is_up().await {
                info!("link down, re-associating");
                self.associate_link().await?;
            }
            let options = self.connect_options()?;
            match self.transport.connect(&options).await {
                Ok(session) => {
                    self.session = Some(session);
                    self.transition(ConnectionEvent::SessionEstablished);
                    self.subscribe_control().await;
                    self.notify_publisher(PublisherCommand::Init).await;
                    return Ok(session);
                }
                Err(err) => {
                    warn!(?err, attempt, retries, "session attempt failed");
                    if attempt < retries {
                        time::sleep(self.settings.session_retry_interval).await;
                    }
                }
            }
        }
        Err(self.halt(RetryStage::Session, retries))
    }

    async fn recover(&mut self) -> Result<(), SupervisorError> {
        self.transition(ConnectionEvent::SessionLost);
        self.notify_publisher(PublisherCommand::Deinit).await;
        if let Err(err) = self.transport.disconnect().await {
            debug!(?err, "closing lost session failed");
        }
        self.session = None;
        self.transition(ConnectionEvent::RecoveryStarted);
        self.establish().await.map(|_| ())
    }

    /// Brings the connection up and keeps it up. Returns `Ok` only when the
    /// transport event stream closes.
    pub async fn supervise(&mut self) -> Result<(), SupervisorError> {
        self.transition(ConnectionEvent::Start);
        if !self.link.is_up().await {
            self.associate_link().await?;
        }
        self.establish().await?;

        while let Some(event) = self.channels.events.recv().await {
            match event {
                TransportEvent::Disconnected { session } if Some(session) == self.session => {
                    warn!(%session, "session lost");
                    self.recover().await?;
                }
                TransportEvent::Disconnected { session } => {
                    debug!(%session, current = ?self.session, "stale disconnect ignored");
                }
                TransportEvent::Message { topic, payload } => {
                    if topic == self.topics.property_subscribe {
                        let message = InboundMessage { topic, payload };
                        if self.channels.inbound_tx.send(message).await.is_err() {
                            warn!("listener stopped, inbound update dropped");
                        }
                    } else {
                        debug!(%topic, "message on unexpected topic ignored");
                    }
                }
            }
        }
        info!("transport event stream closed");
        Ok(())
    }
}
