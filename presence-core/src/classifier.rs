// Presence classifier boundary and the reference motion classifier.
// Invariants: configure() either accepts the whole config or leaves the previous one untouched.

use thiserror::Error;

use crate::model::{ClassifierConfig, Frame, FrameLayout, PresenceEvent, PresenceMode, PresenceState};

const SPEED_OF_LIGHT_M_S: f32 = 299_792_458.0;
const MICRO_BASELINE_ALPHA: f32 = 0.05;
const MICRO_GAIN: f32 = 100.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvalidConfig {
    #[error("range bins out of order: min {min}, max {max}")]
    RangeBins { min: i32, max: i32 },
    #[error("max range bin {max} exceeds the {available} available bins")]
    RangeExceedsProfile { max: i32, available: usize },
    #[error("{field} must be positive and finite, got {value}")]
    Threshold { field: &'static str, value: f32 },
    #[error("bandwidth must be positive, got {0}")]
    Bandwidth(f32),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("frame has {got} samples per chirp, classifier expects {expected}")]
    LayoutMismatch { expected: usize, got: usize },
}

/// Stateful presence decision engine consumed by the acquisition and config workers.
pub trait PresenceClassifier: Send {
    fn configure(&mut self, config: &ClassifierConfig) -> Result<(), InvalidConfig>;
    fn config(&self) -> &ClassifierConfig;
    /// Drops all derived state (reference profiles, timers, current state).
    fn reset(&mut self);
    /// Range bin length in metres for the active configuration.
    fn bin_length(&self) -> f32;
    fn process(&mut self, frame: &Frame, timestamp_ms: u64) -> Result<Vec<PresenceEvent>, ClassifierError>;
}

/// Range-profile energy change detector backing the host build.
///
/// Macro movement compares the averaged-chirp range profile against a
/// snapshot taken one compare interval earlier; micro movement compares it
/// against a slow moving baseline. Events are only emitted on state change.
pub struct MotionClassifier {
    config: ClassifierConfig,
    reference: Option<Vec<f32>>,
    last_compare_ms: Option<u64>,
    baseline: Option<Vec<f32>>,
    last_macro: Option<(u64, i32)>,
    last_micro: Option<(u64, i32)>,
    state: PresenceState,
}

impl MotionClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self, InvalidConfig> {
        validate(&config)?;
        Ok(Self {
            config,
            reference: None,
            last_compare_ms: None,
            baseline: None,
            last_macro: None,
            last_micro: None,
            state: PresenceState::Absence,
        })
    }

    pub fn for_layout(layout: FrameLayout) -> Result<Self, InvalidConfig> {
        Self::new(ClassifierConfig::for_samples(layout.samples_per_chirp))
    }

    pub fn state(&self) -> PresenceState {
        self.state
    }

    fn fft_len(&self) -> usize {
        self.config.samples_per_chirp * 2
    }

    /// DFT magnitudes of the mean-removed chirp for the configured bin window.
    fn range_profile(&self, chirp: &[f32]) -> Vec<f32> {
        let mean = if chirp.is_empty() {
            0.0
        } else {
            chirp.iter().sum::<f32>() / chirp.len() as f32
        };
        let fft_len = self.fft_len() as f32;
        (self.config.min_range_bin..=self.config.max_range_bin)
            .map(|bin| {
                let (mut re, mut im) = (0.0f32, 0.0f32);
                for (n, value) in chirp.iter().enumerate() {
                    let angle = -2.0 * std::f32::consts::PI * bin as f32 * n as f32 / fft_len;
                    let centered = value - mean;
                    re += centered * angle.cos();
                    im += centered * angle.sin();
                }
                (re * re + im * im).sqrt()
            })
            .collect()
    }

    fn strongest_change(&self, profile: &[f32], against: &[f32]) -> Option<(i32, f32)> {
        profile
            .iter()
            .zip(against)
            .map(|(now, then)| (now - then).abs())
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, delta)| (self.config.min_range_bin + index as i32, delta))
    }

    fn update_macro(&mut self, profile: &[f32], timestamp_ms: u64) {
        let due = match self.last_compare_ms {
            Some(prev) => timestamp_ms.saturating_sub(prev) >= self.config.macro_compare_interval_ms,
            None => true,
        };
        if !due {
            return;
        }
        if let Some(reference) = self.reference.as_deref() {
            if let Some((bin, delta)) = self.strongest_change(profile, reference) {
                if delta > self.config.macro_threshold {
                    self.last_macro = Some((timestamp_ms, bin));
                }
            }
        }
        self.reference = Some(profile.to_vec());
        self.last_compare_ms = Some(timestamp_ms);
    }

    fn update_micro(&mut self, profile: &[f32], timestamp_ms: u64) {
        let Some(baseline) = self.baseline.as_deref() else {
            self.baseline = Some(profile.to_vec());
            return;
        };
        if let Some((bin, delta)) = self.strongest_change(profile, baseline) {
            if delta * MICRO_GAIN > self.config.micro_threshold {
                self.last_micro = Some((timestamp_ms, bin));
            }
        }
        if let Some(baseline) = self.baseline.as_mut() {
            for (slow, now) in baseline.iter_mut().zip(profile) {
                *slow += (now - *slow) * MICRO_BASELINE_ALPHA;
            }
        }
    }

    fn decide(&self, timestamp_ms: u64) -> (PresenceState, i32) {
        let within = |hit: Option<(u64, i32)>, validity_ms: u64| {
            hit.filter(|(at, _)| timestamp_ms.saturating_sub(*at) <= validity_ms)
        };
        let mode = self.config.mode;
        let macro_hit = if mode.detects_macro() {
            within(self.last_macro, self.config.macro_movement_validity_ms)
        } else {
            None
        };
        if let Some((_, bin)) = macro_hit {
            return (PresenceState::MacroPresence, bin);
        }
        let micro_allowed = match mode {
            PresenceMode::MacroOnly => false,
            PresenceMode::MicroOnly | PresenceMode::MicroAndMacro => true,
            PresenceMode::MicroIfMacro => self.state.is_presence(),
        };
        if micro_allowed {
            if let Some((_, bin)) = within(self.last_micro, self.config.micro_movement_validity_ms) {
                return (PresenceState::MicroPresence, bin);
            }
        }
        (PresenceState::Absence, 0)
    }
}

impl PresenceClassifier for MotionClassifier {
    fn configure(&mut self, config: &ClassifierConfig) -> Result<(), InvalidConfig> {
        validate(config)?;
        self.config = config.clone();
        Ok(())
    }

    fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    fn reset(&mut self) {
        self.reference = None;
        self.last_compare_ms = None;
        self.baseline = None;
        self.last_macro = None;
        self.last_micro = None;
        self.state = PresenceState::Absence;
    }

    fn bin_length(&self) -> f32 {
        bin_length(self.config.bandwidth_hz)
    }

    fn process(&mut self, frame: &Frame, timestamp_ms: u64) -> Result<Vec<PresenceEvent>, ClassifierError> {
        let got = frame.layout().samples_per_chirp;
        if got != self.config.samples_per_chirp {
            return Err(ClassifierError::LayoutMismatch {
                expected: self.config.samples_per_chirp,
                got,
            });
        }

        let profile = self.range_profile(frame.avg_chirp());
        self.update_macro(&profile, timestamp_ms);
        self.update_micro(&profile, timestamp_ms);

        let (next, bin) = self.decide(timestamp_ms);
        if next == self.state {
            return Ok(Vec::new());
        }
        self.state = next;
        Ok(vec![PresenceEvent::new(next, bin, timestamp_ms)])
    }
}

/// Range resolution with 2x zero-padded range FFT.
pub fn bin_length(bandwidth_hz: f32) -> f32 {
    SPEED_OF_LIGHT_M_S / (4.0 * bandwidth_hz)
}

fn validate(config: &ClassifierConfig) -> Result<(), InvalidConfig> {
    if !(config.bandwidth_hz > 0.0) {
        return Err(InvalidConfig::Bandwidth(config.bandwidth_hz));
    }
    if config.min_range_bin < 0 || config.max_range_bin < config.min_range_bin {
        return Err(InvalidConfig::RangeBins {
            min: config.min_range_bin,
            max: config.max_range_bin,
        });
    }
    if config.max_range_bin as usize >= config.samples_per_chirp {
        return Err(InvalidConfig::RangeExceedsProfile {
            max: config.max_range_bin,
            available: config.samples_per_chirp,
        });
    }
    for (field, value) in [
        ("macro_threshold", config.macro_threshold),
        ("micro_threshold", config.micro_threshold),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(InvalidConfig::Threshold { field, value });
        }
    }
    Ok(())
}
