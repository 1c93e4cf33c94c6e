// Frame preprocessing: ADC normalization and chirp averaging.
// Invariants: output lengths are derived from the frame layout, never from input slices.

use crate::model::{Frame, FrameLayout, RawFrame, ADC_FULL_SCALE};

/// Scales raw ADC counts into `[0.0, 1.0)`.
pub fn normalize(raw: &RawFrame) -> Vec<f32> {
    raw.samples()
        .iter()
        .map(|&sample| sample as f32 / ADC_FULL_SCALE)
        .collect()
}

/// Arithmetic mean across the chirp dimension.
pub fn average_chirps(samples: &[f32], layout: FrameLayout) -> Vec<f32> {
    let mut avg = vec![0.0f32; layout.samples_per_chirp];
    if layout.chirps_per_frame == 0 {
        return avg;
    }
    for chirp in samples.chunks_exact(layout.samples_per_chirp).take(layout.chirps_per_frame) {
        for (acc, value) in avg.iter_mut().zip(chirp) {
            *acc += value;
        }
    }
    let scale = 1.0 / layout.chirps_per_frame as f32;
    for value in &mut avg {
        *value *= scale;
    }
    avg
}

pub fn prepare(raw: &RawFrame) -> Frame {
    let layout = raw.layout();
    let samples = normalize(raw);
    let avg_chirp = average_chirps(&samples, layout);
    Frame::from_parts(layout, samples, avg_chirp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_full_scale() {
        let layout = FrameLayout::new(2, 1);
        let raw = RawFrame::new(layout, vec![2048, 4095]).unwrap();
        let samples = normalize(&raw);
        assert_eq!(samples[0], 0.5);
        assert!(samples[1] < 1.0);
    }

    #[test]
    fn averages_across_chirps() {
        let layout = FrameLayout::new(3, 2);
        let raw = RawFrame::new(layout, vec![0, 1024, 2048, 4096, 1024, 0]).unwrap();
        let frame = prepare(&raw);
        assert_eq!(frame.avg_chirp(), &[0.5, 0.25, 0.25]);
        assert_eq!(frame.samples().len(), 6);
    }
}
