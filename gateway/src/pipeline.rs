// Pipeline wiring: spawns every worker, hands the supervisor its channels, and owns teardown.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{error, info};

use presence_core::classifier::PresenceClassifier;
use presence_core::connection::ConnectionState;
use presence_core::model::PropertyAttributes;
use presence_core::topics::{TopicError, Topics};

use crate::app::{PipelineStats, ResourceHandles, StatusState};
use crate::classifier::SharedClassifier;
use crate::config::GatewayConfig;
use crate::constants::{FIRMWARE_VERSION, INBOUND_QUEUE_CAPACITY, OFFLINE_BACKLOG_CAP, PUBLISHER_QUEUE_CAPACITY};
use crate::sensor::{producer_task, FrameSlot, FrameSource};
use crate::supervisor::{Supervisor, SupervisorChannels, SupervisorError};
use crate::tasks::{acquisition_task, config_task, listener_task, publisher_task, EventSink, Listener, Publisher};
use crate::transport::{Link, Transport, TransportEvent};
use crate::utils::now_epoch_ms;

/// External collaborators the pipeline is assembled from.
pub struct Components {
    pub link: Arc<dyn Link>,
    pub transport: Arc<dyn Transport>,
    pub transport_events: mpsc::Receiver<TransportEvent>,
    pub source: Box<dyn FrameSource>,
    pub classifier: Box<dyn PresenceClassifier>,
}

pub struct Pipeline {
    supervisor: Supervisor,
    handles: ResourceHandles,
    status: StatusState,
}

impl Pipeline {
    /// Spawns the workers. Must be called from within a tokio runtime.
    pub fn start(config: &GatewayConfig, components: Components) -> Result<Self, TopicError> {
        let topics = Topics::derive(&config.tenant_id, &config.device_id)?;
        let stats = Arc::new(PipelineStats::default());
        let start = Instant::now();
        let classifier = SharedClassifier::new(components.classifier);

        let (publisher_tx, publisher_rx) = mpsc::channel(PUBLISHER_QUEUE_CAPACITY);
        let (config_tx, config_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (history_tx, history_rx) = watch::channel(Vec::new());
        let (presence_tx, presence_rx) = watch::channel(None);
        let (attributes_tx, attributes_rx) = watch::channel(PropertyAttributes::default());
        let slot = Arc::new(FrameSlot::new());

        let publisher = Publisher::new(
            components.transport.clone(),
            topics.clone(),
            FIRMWARE_VERSION,
            classifier.bin_length(),
            now_epoch_ms(),
            OFFLINE_BACKLOG_CAP,
            stats.clone(),
        );
        let listener = Listener::new(attributes_tx, config_tx, publisher_tx.clone());

        let handles = ResourceHandles {
            listener: Some(tokio::spawn(listener_task(listener, inbound_rx))),
            publisher: Some(tokio::spawn(publisher_task(publisher, publisher_rx))),
            config: Some(tokio::spawn(config_task(classifier.clone(), config_rx, stats.clone()))),
            acquisition: Some(tokio::spawn(acquisition_task(
                slot.clone(),
                classifier.clone(),
                EventSink {
                    publisher_tx: publisher_tx.clone(),
                    presence_tx,
                },
                stats.clone(),
                start,
            ))),
            producer: Some(tokio::spawn(producer_task(components.source, slot, stats.clone()))),
            transport: Some(components.transport.clone()),
            link: Some(components.link.clone()),
        };

        info!(
            device = %config.device_id,
            telemetry = %topics.telemetry,
            control = %topics.property_subscribe,
            "pipeline started"
        );
        let supervisor = Supervisor::new(
            components.link,
            components.transport,
            topics,
            config.device_id.as_str(),
            config.supervisor.clone(),
            SupervisorChannels {
                state_tx,
                history_tx,
                publisher_tx,
                inbound_tx,
                events: components.transport_events,
            },
        );
        let status = StatusState {
            connection: state_rx,
            transitions: history_rx,
            presence: presence_rx,
            attributes: attributes_rx,
            classifier,
            stats,
        };

        Ok(Self {
            supervisor,
            handles,
            status,
        })
    }

    pub fn status(&self) -> StatusState {
        self.status.clone()
    }

    /// Supervises the connection until it halts or the transport closes,
    /// then tears every resource down.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        let result = self.supervisor.supervise().await;
        if let Err(err) = &result {
            error!(%err, "supervisor halted");
        }
        self.handles.teardown().await;
        result
    }
}
