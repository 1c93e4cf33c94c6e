// Acquisition worker: preprocess each frame, classify it, forward the events.
// Invariants: process() runs exactly once per taken frame; forwarding never blocks.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use presence_core::model::{PresenceEvent, RawFrame};
use presence_core::preprocess::prepare;

use crate::app::{bump, PipelineStats, PublisherCommand};
use crate::classifier::SharedClassifier;
use crate::sensor::FrameSlot;
use crate::utils::monotonic_ms;

/// Where classified events go: the publisher queue and the latest-state view.
pub struct EventSink {
    pub publisher_tx: mpsc::Sender<PublisherCommand>,
    pub presence_tx: watch::Sender<Option<PresenceEvent>>,
}

/// Classifies one frame and hands every resulting event to the publisher.
/// Returns the number of events forwarded.
pub async fn process_raw_frame(
    raw: &RawFrame,
    timestamp_ms: u64,
    classifier: &SharedClassifier,
    sink: &EventSink,
    stats: &PipelineStats,
) -> usize {
    let frame = prepare(raw);
    let events = match classifier.process(&frame, timestamp_ms).await {
        Ok(events) => events,
        Err(err) => {
            warn!(?err, timestamp_ms, "classification failed, frame dropped");
            return 0;
        }
    };
    bump(&stats.frames_processed);

    let mut forwarded = 0;
    for event in events {
        bump(&stats.events_emitted);
        info!(
            state = event.state.as_str(),
            range_bin = event.range_bin,
            timestamp_ms = event.timestamp_ms,
            "presence state changed"
        );
        sink.presence_tx.send_replace(Some(event));
        match sink.publisher_tx.try_send(PublisherCommand::Telemetry(event)) {
            Ok(()) => forwarded += 1,
            Err(TrySendError::Full(_)) => {
                bump(&stats.events_dropped);
                warn!(state = event.state.as_str(), "publisher queue full, event dropped");
            }
            Err(TrySendError::Closed(_)) => {
                bump(&stats.events_dropped);
                warn!("publisher stopped, event dropped");
            }
        }
    }
    forwarded
}

pub async fn acquisition_task(
    slot: Arc<FrameSlot>,
    classifier: SharedClassifier,
    sink: EventSink,
    stats: Arc<PipelineStats>,
    start: Instant,
) {
    loop {
        let raw = slot.wait().await;
        process_raw_frame(&raw, monotonic_ms(start), &classifier, &sink, &stats).await;
    }
}
