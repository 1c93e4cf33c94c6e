// Scripted fakes for the external collaborators used across gateway tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use presence_core::classifier::{ClassifierError, InvalidConfig, PresenceClassifier};
use presence_core::model::{ClassifierConfig, Frame, FrameError, FrameLayout, PresenceEvent, RawFrame};

use crate::sensor::FrameSource;
use crate::transport::{ConnectOptions, Link, LinkError, SessionId, Transport, TransportError};

pub async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

pub fn flat_frame(layout: FrameLayout, level: u16) -> RawFrame {
    RawFrame::new(layout, vec![level; layout.len()]).unwrap()
}

#[derive(Default)]
struct ProbeState {
    calls: Mutex<Vec<u64>>,
    resets: AtomicUsize,
    script: Mutex<VecDeque<Vec<PresenceEvent>>>,
    reject_above: Mutex<Option<i32>>,
    configs: Mutex<Vec<ClassifierConfig>>,
}

/// Observation and scripting handle for a boxed `ScriptedClassifier`.
#[derive(Clone, Default)]
pub struct ClassifierSpy {
    state: Arc<ProbeState>,
}

impl ClassifierSpy {
    pub fn push_events(&self, events: Vec<PresenceEvent>) {
        self.state.script.lock().unwrap().push_back(events);
    }

    pub fn calls(&self) -> Vec<u64> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn resets(&self) -> usize {
        self.state.resets.load(Ordering::SeqCst)
    }

    pub fn reject_max_range_above(&self, limit: i32) {
        *self.state.reject_above.lock().unwrap() = Some(limit);
    }

    pub fn configs(&self) -> Vec<ClassifierConfig> {
        self.state.configs.lock().unwrap().clone()
    }
}

pub struct ScriptedClassifier {
    config: ClassifierConfig,
    bin_length: f32,
    spy: ClassifierSpy,
}

impl ScriptedClassifier {
    pub fn new(bin_length: f32) -> (Self, ClassifierSpy) {
        let spy = ClassifierSpy::default();
        let classifier = Self {
            config: ClassifierConfig::default(),
            bin_length,
            spy: spy.clone(),
        };
        (classifier, spy)
    }
}

impl PresenceClassifier for ScriptedClassifier {
    fn configure(&mut self, config: &ClassifierConfig) -> Result<(), InvalidConfig> {
        if let Some(limit) = *self.spy.state.reject_above.lock().unwrap() {
            if config.max_range_bin > limit {
                return Err(InvalidConfig::RangeExceedsProfile {
                    max: config.max_range_bin,
                    available: limit as usize,
                });
            }
        }
        self.config = config.clone();
        self.spy.state.configs.lock().unwrap().push(config.clone());
        Ok(())
    }

    fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    fn reset(&mut self) {
        self.spy.state.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn bin_length(&self) -> f32 {
        self.bin_length
    }

    fn process(&mut self, _frame: &Frame, timestamp_ms: u64) -> Result<Vec<PresenceEvent>, ClassifierError> {
        self.spy.state.calls.lock().unwrap().push(timestamp_ms);
        Ok(self.spy.state.script.lock().unwrap().pop_front().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MockTransport {
    connect_failures: AtomicUsize,
    subscribe_failures: AtomicUsize,
    publish_failing: AtomicBool,
    next_session: AtomicU64,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    subscriptions: Mutex<Vec<String>>,
    published: Mutex<Vec<(String, String)>>,
    options: Mutex<Vec<ConnectOptions>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_connects(count: usize) -> Self {
        let transport = Self::default();
        transport.connect_failures.store(count, Ordering::SeqCst);
        transport
    }

    pub fn fail_subscribes(&self, count: usize) {
        self.subscribe_failures.store(count, Ordering::SeqCst);
    }

    pub fn set_publish_failing(&self, failing: bool) {
        self.publish_failing.store(failing, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|(published_topic, _)| published_topic == topic)
            .map(|(_, payload)| payload)
            .collect()
    }

    pub fn last_options(&self) -> Option<ConnectOptions> {
        self.options.lock().unwrap().last().cloned()
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, options: &ConnectOptions) -> Result<SessionId, TransportError> {
        self.options.lock().unwrap().push(options.clone());
        if take_failure(&self.connect_failures) {
            return Err(TransportError::Rejected("scripted connect failure".to_string()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(SessionId(self.next_session.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        if self.publish_failing.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        let payload = String::from_utf8_lossy(payload).into_owned();
        self.published.lock().unwrap().push((topic.to_string(), payload));
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        if take_failure(&self.subscribe_failures) {
            return Err(TransportError::Timeout("suback"));
        }
        self.subscriptions.lock().unwrap().push(topic.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockLink {
    up: AtomicBool,
    associate_failures: AtomicUsize,
    associations: AtomicUsize,
    releases: AtomicUsize,
}

impl MockLink {
    pub fn up() -> Self {
        let link = Self::default();
        link.up.store(true, Ordering::SeqCst);
        link
    }

    pub fn down_failing(count: usize) -> Self {
        let link = Self::default();
        link.associate_failures.store(count, Ordering::SeqCst);
        link
    }

    pub fn drop_link(&self) {
        self.up.store(false, Ordering::SeqCst);
    }

    pub fn associations(&self) -> usize {
        self.associations.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Link for MockLink {
    async fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    async fn associate(&self) -> Result<(), LinkError> {
        if take_failure(&self.associate_failures) {
            return Err(LinkError::NoInterface);
        }
        self.associations.fetch_add(1, Ordering::SeqCst);
        self.up.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.up.store(false, Ordering::SeqCst);
    }
}

/// Frame source driven by the test through an unbounded channel.
pub struct ManualSource {
    frames: mpsc::UnboundedReceiver<Result<RawFrame, FrameError>>,
    pending: Option<Result<RawFrame, FrameError>>,
}

impl ManualSource {
    pub fn new() -> (Self, mpsc::UnboundedSender<Result<RawFrame, FrameError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { frames: rx, pending: None }, tx)
    }
}

#[async_trait]
impl FrameSource for ManualSource {
    async fn wait_ready(&mut self) -> bool {
        match self.frames.recv().await {
            Some(item) => {
                self.pending = Some(item);
                true
            }
            None => false,
        }
    }

    async fn read_frame(&mut self) -> Result<RawFrame, FrameError> {
        self.pending
            .take()
            .unwrap_or_else(|| Err(FrameError::Sensor("no frame ready".to_string())))
    }
}
