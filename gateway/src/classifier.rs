// Shared classifier context guarded by a single async mutex.
// Invariants: the lock is never held across I/O; configure and reset happen under one acquisition.

use std::sync::Arc;

use tokio::sync::Mutex;

use presence_core::classifier::{ClassifierError, InvalidConfig, PresenceClassifier};
use presence_core::model::{ClassifierConfig, ConfigCommand, Frame, PresenceEvent};

#[derive(Clone)]
pub struct SharedClassifier {
    inner: Arc<Mutex<Box<dyn PresenceClassifier>>>,
    bin_length: f32,
}

impl SharedClassifier {
    pub fn new(classifier: Box<dyn PresenceClassifier>) -> Self {
        let bin_length = classifier.bin_length();
        Self {
            inner: Arc::new(Mutex::new(classifier)),
            bin_length,
        }
    }

    /// Range bin length fixed by the sensor bandwidth.
    pub fn bin_length(&self) -> f32 {
        self.bin_length
    }

    pub async fn process(&self, frame: &Frame, timestamp_ms: u64) -> Result<Vec<PresenceEvent>, ClassifierError> {
        let mut classifier = self.inner.lock().await;
        classifier.process(frame, timestamp_ms)
    }

    /// Applies one command as read-modify-write; state is reset only when the
    /// classifier accepts the new configuration.
    pub async fn apply(&self, command: &ConfigCommand) -> Result<ClassifierConfig, InvalidConfig> {
        let mut classifier = self.inner.lock().await;
        let next = classifier.config().with_command(command, classifier.bin_length());
        classifier.configure(&next)?;
        classifier.reset();
        Ok(next)
    }

    pub async fn config_snapshot(&self) -> ClassifierConfig {
        self.inner.lock().await.config().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedClassifier;
    use presence_core::model::PresenceMode;

    #[tokio::test]
    async fn last_write_wins_and_resets_every_apply() {
        let (classifier, spy) = ScriptedClassifier::new(0.2);
        let shared = SharedClassifier::new(Box::new(classifier));

        for value in [3.0, 4.0, 5.0] {
            shared.apply(&ConfigCommand::MacroThreshold(value)).await.unwrap();
        }
        assert_eq!(shared.config_snapshot().await.macro_threshold, 5.0);
        assert_eq!(spy.resets(), 3);
    }

    #[tokio::test]
    async fn max_range_converts_with_bin_length() {
        let (classifier, _spy) = ScriptedClassifier::new(0.25);
        let shared = SharedClassifier::new(Box::new(classifier));
        let config = shared.apply(&ConfigCommand::MaxRange(2.0)).await.unwrap();
        assert_eq!(config.max_range_bin, 8);
    }

    #[tokio::test]
    async fn rejected_config_keeps_previous_without_reset() {
        let (classifier, spy) = ScriptedClassifier::new(0.2);
        spy.reject_max_range_above(10);
        let shared = SharedClassifier::new(Box::new(classifier));

        shared.apply(&ConfigCommand::Mode(PresenceMode::MacroOnly)).await.unwrap();
        assert!(shared.apply(&ConfigCommand::MaxRange(10.0)).await.is_err());

        let config = shared.config_snapshot().await;
        assert_eq!(config.max_range_bin, 5);
        assert_eq!(config.mode, PresenceMode::MacroOnly);
        assert_eq!(spy.resets(), 1);
    }
}
