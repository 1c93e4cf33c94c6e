// Recorded frame playback paced by the recorded offsets.

use std::io;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time;
use tracing::{info, warn};

use presence_core::model::{FrameError, FrameLayout, RawFrame};

use crate::sensor::FrameSource;

const RECORD_HEADER_LEN: usize = 12;

struct ReplayRecord {
    offset_ms: u64,
    samples: Vec<u16>,
}

/// Plays `u64` LE offset, `u32` LE sample count, `count` LE `u16` samples records.
pub struct ReplaySource {
    layout: FrameLayout,
    records: Vec<ReplayRecord>,
    cursor: usize,
    last_offset_ms: u64,
    looping: bool,
    pending: Option<usize>,
}

impl ReplaySource {
    pub async fn open(path: &Path, layout: FrameLayout) -> io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let source = Self::from_bytes(&bytes, layout)?;
        info!(path = %path.display(), frames = source.records.len(), "replay recording loaded");
        Ok(source)
    }

    pub fn from_bytes(bytes: &[u8], layout: FrameLayout) -> io::Result<Self> {
        let records = parse_records(bytes);
        if records.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "recording holds no frames"));
        }
        Ok(Self {
            layout,
            records,
            cursor: 0,
            last_offset_ms: 0,
            looping: true,
            pending: None,
        })
    }

    /// Restart from the first record once the recording ends.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

fn parse_records(bytes: &[u8]) -> Vec<ReplayRecord> {
    let mut records = Vec::new();
    let mut rest = bytes;
    while rest.len() >= RECORD_HEADER_LEN {
        let (header, tail) = rest.split_at(RECORD_HEADER_LEN);
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&header[0..8]);
        let mut count = [0u8; 4];
        count.copy_from_slice(&header[8..12]);
        let byte_len = u32::from_le_bytes(count) as usize * 2;
        if tail.len() < byte_len {
            warn!(expected = byte_len, available = tail.len(), "truncated trailing record ignored");
            break;
        }
        let samples = tail[..byte_len]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        records.push(ReplayRecord {
            offset_ms: u64::from_le_bytes(offset),
            samples,
        });
        rest = &tail[byte_len..];
    }
    records
}

#[cfg(test)]
fn encode_record(offset_ms: u64, samples: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(RECORD_HEADER_LEN + samples.len() * 2);
    out.extend_from_slice(&offset_ms.to_le_bytes());
    out.extend_from_slice(&(samples.len() as u32).to_le_bytes());
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

#[async_trait]
impl FrameSource for ReplaySource {
    async fn wait_ready(&mut self) -> bool {
        if self.cursor >= self.records.len() {
            if !self.looping {
                return false;
            }
            self.cursor = 0;
            self.last_offset_ms = 0;
        }
        let offset_ms = self.records[self.cursor].offset_ms;
        let delay_ms = offset_ms.saturating_sub(self.last_offset_ms);
        if delay_ms > 0 {
            time::sleep(Duration::from_millis(delay_ms)).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.last_offset_ms = offset_ms;
        self.pending = Some(self.cursor);
        self.cursor += 1;
        true
    }

    async fn read_frame(&mut self) -> Result<RawFrame, FrameError> {
        let index = self
            .pending
            .take()
            .ok_or_else(|| FrameError::Sensor("read without data-ready".to_string()))?;
        RawFrame::new(self.layout, self.records[index].samples.clone())
    }
}
