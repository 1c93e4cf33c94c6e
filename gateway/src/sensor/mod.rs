// Sample producer: frame sources and the single-slot handoff to acquisition.
// Invariants: the slot holds at most one frame; a newer frame replaces an undrained one.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use presence_core::model::{FrameError, RawFrame};

use crate::app::{bump, PipelineStats};

mod replay;
mod synthetic;

pub use replay::ReplaySource;
pub use synthetic::SyntheticSource;

/// Hardware boundary: a ready signal followed by one FIFO read.
#[async_trait]
pub trait FrameSource: Send {
    /// Resolves on the next data-ready tick; `false` once the source is exhausted.
    async fn wait_ready(&mut self) -> bool;
    async fn read_frame(&mut self) -> Result<RawFrame, FrameError>;
}

#[derive(Default)]
pub struct FrameSlot {
    frame: Mutex<Option<RawFrame>>,
    ready: Notify,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a frame and wakes the consumer. Returns true when an undrained
    /// frame was overwritten.
    pub fn publish(&self, frame: RawFrame) -> bool {
        let replaced = {
            let mut slot = self.frame.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            slot.replace(frame).is_some()
        };
        self.ready.notify_one();
        replaced
    }

    pub fn take(&self) -> Option<RawFrame> {
        self.frame
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    pub async fn wait(&self) -> RawFrame {
        loop {
            if let Some(frame) = self.take() {
                return frame;
            }
            self.ready.notified().await;
        }
    }
}

pub async fn producer_task(mut source: Box<dyn FrameSource>, slot: Arc<FrameSlot>, stats: Arc<PipelineStats>) {
    while source.wait_ready().await {
        match source.read_frame().await {
            Ok(frame) => {
                bump(&stats.frames_captured);
                if slot.publish(frame) {
                    bump(&stats.frames_overwritten);
                    debug!("acquisition behind, frame overwritten");
                }
            }
            Err(err) => {
                bump(&stats.frame_faults);
                warn!(?err, "frame read failed, skipping cycle");
            }
        }
    }
    info!("frame source exhausted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{flat_frame, ManualSource};
    use presence_core::model::FrameLayout;

    #[test]
    fn slot_keeps_only_latest_frame() {
        let layout = FrameLayout::new(2, 1);
        let slot = FrameSlot::new();
        assert!(!slot.publish(flat_frame(layout, 1)));
        assert!(slot.publish(flat_frame(layout, 2)));
        assert_eq!(slot.take().unwrap().samples(), &[2, 2]);
        assert!(slot.take().is_none());
    }

    #[tokio::test]
    async fn wait_returns_published_frame() {
        let layout = FrameLayout::new(2, 1);
        let slot = Arc::new(FrameSlot::new());
        let waiter = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.wait().await })
        };
        tokio::task::yield_now().await;
        slot.publish(flat_frame(layout, 9));
        assert_eq!(waiter.await.unwrap().samples(), &[9, 9]);
    }

    #[tokio::test]
    async fn producer_counts_overwrites_and_faults() {
        let layout = FrameLayout::new(2, 1);
        let (source, frames) = ManualSource::new();
        let slot = Arc::new(FrameSlot::new());
        let stats = Arc::new(PipelineStats::default());
        let producer = tokio::spawn(producer_task(Box::new(source), slot.clone(), stats.clone()));

        frames.send(Ok(flat_frame(layout, 1))).unwrap();
        frames.send(Err(FrameError::Sensor("fifo overflow".to_string()))).unwrap();
        frames.send(Ok(flat_frame(layout, 3))).unwrap();
        drop(frames);
        producer.await.unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_captured, 2);
        assert_eq!(snapshot.frames_overwritten, 1);
        assert_eq!(snapshot.frame_faults, 1);
        assert_eq!(slot.take().unwrap().samples(), &[3, 3]);
    }
}
