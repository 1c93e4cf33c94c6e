// Deterministic beat-tone generator standing in for the radar FIFO.

use std::f32::consts::PI;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, Interval, MissedTickBehavior};

use presence_core::model::{FrameError, FrameLayout, RawFrame};

use crate::sensor::FrameSource;

const ADC_MIDSCALE: f32 = 2048.0;
const CLUTTER_AMPLITUDE: f32 = 80.0;
const TARGET_AMPLITUDE: f32 = 600.0;
const SCENE_CYCLE_TICKS: u64 = 100;
const TARGET_PRESENT_TICKS: u64 = 60;

/// Scene with static clutter and a target that walks between range bins
/// for part of every cycle.
pub struct SyntheticSource {
    layout: FrameLayout,
    interval: Interval,
    tick: u64,
}

impl SyntheticSource {
    pub fn new(layout: FrameLayout, period: Duration) -> Self {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            layout,
            interval,
            tick: 0,
        }
    }

    fn target_bin(tick: u64) -> Option<f32> {
        let position = tick % SCENE_CYCLE_TICKS;
        (position < TARGET_PRESENT_TICKS).then(|| 2.0 + (position / 20) as f32)
    }

    pub fn frame_at(layout: FrameLayout, tick: u64) -> Result<RawFrame, FrameError> {
        let fft_len = (layout.samples_per_chirp * 2) as f32;
        let target = Self::target_bin(tick);
        let mut samples = Vec::with_capacity(layout.len());
        for chirp in 0..layout.chirps_per_frame {
            for n in 0..layout.samples_per_chirp {
                let mut value = ADC_MIDSCALE + CLUTTER_AMPLITUDE * (2.0 * PI * n as f32 / fft_len).cos();
                if let Some(bin) = target {
                    let phase = 2.0 * PI * bin * n as f32 / fft_len + 0.3 * chirp as f32 + 0.7 * tick as f32;
                    value += TARGET_AMPLITUDE * phase.cos();
                }
                samples.push(value.clamp(0.0, 4095.0) as u16);
            }
        }
        RawFrame::new(layout, samples)
    }
}

#[async_trait]
impl FrameSource for SyntheticSource {
    async fn wait_ready(&mut self) -> bool {
        self.interval.tick().await;
        true
    }

    async fn read_frame(&mut self) -> Result<RawFrame, FrameError> {
        let frame = Self::frame_at(self.layout, self.tick);
        self.tick += 1;
        frame
    }
}
