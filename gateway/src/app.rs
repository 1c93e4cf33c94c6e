// Application state shared between workers, the supervisor, and the status endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use presence_core::connection::{ConnectionState, ConnectionTransition};
use presence_core::model::{PresenceEvent, PropertyAttributes};

use crate::classifier::SharedClassifier;
use crate::transport::{Link, Transport};

/// Requests consumed by the telemetry publisher, in arrival order.
#[derive(Clone, Debug, PartialEq)]
pub enum PublisherCommand {
    Init,
    Deinit,
    PropertyAck(PropertyAttributes),
    Telemetry(PresenceEvent),
}

/// Inbound payload on the property-subscribe topic.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct PipelineStats {
    pub frames_captured: AtomicU64,
    pub frames_overwritten: AtomicU64,
    pub frame_faults: AtomicU64,
    pub frames_processed: AtomicU64,
    pub events_emitted: AtomicU64,
    pub events_dropped: AtomicU64,
    pub backlog_dropped: AtomicU64,
    pub payloads_published: AtomicU64,
    pub publish_failures: AtomicU64,
    pub commands_applied: AtomicU64,
    pub commands_rejected: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub frames_captured: u64,
    pub frames_overwritten: u64,
    pub frame_faults: u64,
    pub frames_processed: u64,
    pub events_emitted: u64,
    pub events_dropped: u64,
    pub backlog_dropped: u64,
    pub payloads_published: u64,
    pub publish_failures: u64,
    pub commands_applied: u64,
    pub commands_rejected: u64,
}

pub fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            frames_captured: load(&self.frames_captured),
            frames_overwritten: load(&self.frames_overwritten),
            frame_faults: load(&self.frame_faults),
            frames_processed: load(&self.frames_processed),
            events_emitted: load(&self.events_emitted),
            events_dropped: load(&self.events_dropped),
            backlog_dropped: load(&self.backlog_dropped),
            payloads_published: load(&self.payloads_published),
            publish_failures: load(&self.publish_failures),
            commands_applied: load(&self.commands_applied),
            commands_rejected: load(&self.commands_rejected),
        }
    }
}

/// Read-only view handed to the status endpoint.
#[derive(Clone)]
pub struct StatusState {
    pub connection: watch::Receiver<ConnectionState>,
    pub transitions: watch::Receiver<Vec<ConnectionTransition>>,
    pub presence: watch::Receiver<Option<PresenceEvent>>,
    pub attributes: watch::Receiver<PropertyAttributes>,
    pub classifier: SharedClassifier,
    pub stats: Arc<PipelineStats>,
}

/// Every resource acquired at startup; `None` once released or never acquired.
#[derive(Default)]
pub struct ResourceHandles {
    pub listener: Option<JoinHandle<()>>,
    pub publisher: Option<JoinHandle<()>>,
    pub config: Option<JoinHandle<()>>,
    pub acquisition: Option<JoinHandle<()>>,
    pub producer: Option<JoinHandle<()>>,
    pub transport: Option<Arc<dyn Transport>>,
    pub link: Option<Arc<dyn Link>>,
}

impl ResourceHandles {
    /// Releases whatever was acquired, consumers first and the link last.
    pub async fn teardown(&mut self) {
        let workers = [
            ("listener", self.listener.take()),
            ("publisher", self.publisher.take()),
            ("config", self.config.take()),
            ("acquisition", self.acquisition.take()),
            ("producer", self.producer.take()),
        ];
        for (name, handle) in workers {
            let Some(handle) = handle else {
                continue;
            };
            handle.abort();
            match handle.await {
                Ok(()) => debug!(worker = name, "worker had already finished"),
                Err(err) if err.is_cancelled() => debug!(worker = name, "worker stopped"),
                Err(err) => warn!(?err, worker = name, "worker panicked"),
            }
        }

        if let Some(transport) = self.transport.take() {
            if let Err(err) = transport.disconnect().await {
                warn!(?err, "session disconnect failed during teardown");
            }
        }
        if let Some(link) = self.link.take() {
            link.release().await;
        }
        info!("resources released");
    }

    pub fn is_released(&self) -> bool {
        self.listener.is_none()
            && self.publisher.is_none()
            && self.config.is_none()
            && self.acquisition.is_none()
            && self.producer.is_none()
            && self.transport.is_none()
            && self.link.is_none()
    }
}
