// Radar frame containers.
// Invariants: sample count always equals the layout size; frames are immutable after capture.

use thiserror::Error;

/// 12-bit ADC full scale used to normalize raw samples.
pub const ADC_FULL_SCALE: f32 = 4096.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameLayout {
    pub samples_per_chirp: usize,
    pub chirps_per_frame: usize,
}

impl FrameLayout {
    pub const fn new(samples_per_chirp: usize, chirps_per_frame: usize) -> Self {
        Self {
            samples_per_chirp,
            chirps_per_frame,
        }
    }

    /// Total number of samples in one frame (single RX antenna).
    pub const fn len(&self) -> usize {
        self.samples_per_chirp * self.chirps_per_frame
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self::new(128, 16)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame length mismatch: expected {expected} samples, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("sensor fifo read failed: {0}")]
    Sensor(String),
}

/// One capture cycle of raw ADC samples, laid out `[chirp][sample]`.
#[derive(Clone, Debug, PartialEq)]
pub struct RawFrame {
    layout: FrameLayout,
    samples: Vec<u16>,
}

impl RawFrame {
    pub fn new(layout: FrameLayout, samples: Vec<u16>) -> Result<Self, FrameError> {
        if samples.len() != layout.len() {
            return Err(FrameError::LengthMismatch {
                expected: layout.len(),
                got: samples.len(),
            });
        }
        Ok(Self { layout, samples })
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }
}

/// Normalized frame plus its chirp-averaged profile, ready for classification.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    layout: FrameLayout,
    samples: Vec<f32>,
    avg_chirp: Vec<f32>,
}

impl Frame {
    pub(crate) fn from_parts(layout: FrameLayout, samples: Vec<f32>, avg_chirp: Vec<f32>) -> Self {
        Self {
            layout,
            samples,
            avg_chirp,
        }
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn avg_chirp(&self) -> &[f32] {
        &self.avg_chirp
    }
}
