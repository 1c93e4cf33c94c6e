// Remote-update listener: turns inbound property documents into config commands and one ack.

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use presence_core::model::{ConfigCommand, PropertyAttributes};
use presence_core::properties::parse_update;

use crate::app::{InboundMessage, PublisherCommand};

pub struct Listener {
    attributes: PropertyAttributes,
    attributes_tx: watch::Sender<PropertyAttributes>,
    config_tx: mpsc::UnboundedSender<ConfigCommand>,
    publisher_tx: mpsc::Sender<PublisherCommand>,
}

impl Listener {
    pub fn new(
        attributes_tx: watch::Sender<PropertyAttributes>,
        config_tx: mpsc::UnboundedSender<ConfigCommand>,
        publisher_tx: mpsc::Sender<PublisherCommand>,
    ) -> Self {
        let attributes = *attributes_tx.borrow();
        Self {
            attributes,
            attributes_tx,
            config_tx,
            publisher_tx,
        }
    }

    pub fn attributes(&self) -> PropertyAttributes {
        self.attributes
    }

    /// Returns the number of commands emitted, or `None` when the payload was
    /// not a JSON document.
    pub async fn handle(&mut self, message: InboundMessage) -> Option<usize> {
        let update = match parse_update(&message.payload) {
            Ok(update) => update,
            Err(err) => {
                warn!(?err, topic = %message.topic, "ignoring malformed property update");
                return None;
            }
        };

        for rejected in &update.rejected {
            warn!(key = %rejected.key, reason = rejected.reason, "property value ignored");
        }

        let mut emitted = 0;
        for extracted in update.extracted {
            let command = extracted.command;
            if let Some(received) = extracted.clamped {
                warn!(
                    property = command.property_name(),
                    received,
                    applied = ?command,
                    "property out of range, clamped to minimum"
                );
            }
            if self.config_tx.send(command).is_err() {
                warn!(?command, "config worker stopped, command dropped");
            }
            self.attributes.apply(&command);
            emitted += 1;
        }

        self.attributes_tx.send_replace(self.attributes);
        debug!(commands = emitted, "property update processed");
        if self
            .publisher_tx
            .send(PublisherCommand::PropertyAck(self.attributes))
            .await
            .is_err()
        {
            warn!("publisher stopped, ack dropped");
        }
        Some(emitted)
    }
}

pub async fn listener_task(mut listener: Listener, mut inbound: mpsc::Receiver<InboundMessage>) {
    while let Some(message) = inbound.recv().await {
        listener.handle(message).await;
    }
}
