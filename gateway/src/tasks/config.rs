// Config worker: applies remote commands to the live classifier in receipt order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error};

use presence_core::model::ConfigCommand;

use crate::app::{bump, PipelineStats};
use crate::classifier::SharedClassifier;

pub async fn config_task(
    classifier: SharedClassifier,
    mut commands: mpsc::UnboundedReceiver<ConfigCommand>,
    stats: Arc<PipelineStats>,
) {
    while let Some(command) = commands.recv().await {
        match classifier.apply(&command).await {
            Ok(config) => {
                bump(&stats.commands_applied);
                debug!(
                    property = command.property_name(),
                    max_range_bin = config.max_range_bin,
                    macro_threshold = config.macro_threshold,
                    micro_threshold = config.micro_threshold,
                    mode = config.mode.as_str(),
                    "classifier reconfigured"
                );
            }
            Err(err) => {
                bump(&stats.commands_rejected);
                error!(?err, ?command, "classifier rejected configuration, keeping previous");
            }
        }
    }
}
