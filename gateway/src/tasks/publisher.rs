// Telemetry publisher: encodes outbound payloads and hands them to the transport.
// Invariants: publish failures are never retried; only telemetry survives an offline period.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use presence_core::model::{PresenceEvent, PropertyAttributes};
use presence_core::payload::{self, PayloadError};
use presence_core::topics::Topics;

use crate::app::{bump, PipelineStats, PublisherCommand};
use crate::buffers::RingBuffer;
use crate::transport::Transport;

pub struct Publisher {
    transport: Arc<dyn Transport>,
    topics: Topics,
    fw_version: String,
    bin_length: f32,
    epoch_base_ms: u64,
    online: bool,
    backlog: RingBuffer<PresenceEvent>,
    stats: Arc<PipelineStats>,
}

impl Publisher {
    /// `epoch_base_ms` is the wall-clock time at which event timestamps are zero.
    pub fn new(
        transport: Arc<dyn Transport>,
        topics: Topics,
        fw_version: impl Into<String>,
        bin_length: f32,
        epoch_base_ms: u64,
        backlog_cap: usize,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            transport,
            topics,
            fw_version: fw_version.into(),
            bin_length,
            epoch_base_ms,
            online: false,
            backlog: RingBuffer::new(backlog_cap),
            stats,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub async fn handle(&mut self, command: PublisherCommand) {
        match command {
            PublisherCommand::Init => {
                self.online = true;
                info!(backlog = self.backlog.len(), "publisher online");
                self.publish_firmware_report().await;
                for event in self.backlog.drain_ordered() {
                    self.publish_telemetry(&event).await;
                }
            }
            PublisherCommand::Deinit => {
                self.online = false;
                info!("publisher offline");
            }
            PublisherCommand::PropertyAck(attributes) => {
                if self.online {
                    self.publish_ack(&attributes).await;
                } else {
                    warn!("property ack dropped while offline");
                }
            }
            PublisherCommand::Telemetry(event) => {
                if self.online {
                    self.publish_telemetry(&event).await;
                } else if self.backlog.push(event).is_some() {
                    bump(&self.stats.backlog_dropped);
                    warn!("offline backlog full, oldest event dropped");
                }
            }
        }
    }

    async fn publish_firmware_report(&self) {
        let encoded = payload::firmware_report(&self.fw_version);
        self.send(&self.topics.property_publish, encoded).await;
    }

    async fn publish_ack(&self, attributes: &PropertyAttributes) {
        let encoded = payload::property_ack(attributes);
        self.send(&self.topics.property_publish, encoded).await;
    }

    async fn publish_telemetry(&self, event: &PresenceEvent) {
        let unix_secs = (self.epoch_base_ms + event.timestamp_ms) / 1_000;
        let encoded = payload::telemetry(event, self.bin_length, unix_secs);
        self.send(&self.topics.telemetry, encoded).await;
    }

    async fn send(&self, topic: &str, encoded: Result<String, PayloadError>) {
        let body = match encoded {
            Ok(body) => body,
            Err(err) => {
                error!(?err, topic, "payload abandoned");
                return;
            }
        };
        match self.transport.publish(topic, body.as_bytes()).await {
            Ok(()) => {
                bump(&self.stats.payloads_published);
                debug!(topic, payload = %body, "published");
            }
            Err(err) => {
                bump(&self.stats.publish_failures);
                warn!(?err, topic, "publish failed");
            }
        }
    }
}

pub async fn publisher_task(mut publisher: Publisher, mut commands: mpsc::Receiver<PublisherCommand>) {
    while let Some(command) = commands.recv().await {
        publisher.handle(command).await;
    }
}
