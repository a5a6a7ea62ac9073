//! Offline source: replay a WAV file through the engine in fixed-size blocks.

use hound::{SampleFormat, WavReader};
use log::{debug, info};
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use super::engine::SpectrumEngine;
use crate::error::CaptureError;

/// Frames per block handed to `ingest` (10 ms at 48 kHz)
pub const DEFAULT_BLOCK_FRAMES: usize = 480;

/// What a replay delivered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplaySummary {
    pub blocks: usize,
    pub frames: usize,
    pub duration_secs: f32,
}

/// Feeds WAV audio to an engine as if it came from a capture callback
pub struct WavReplay {
    block_frames: usize,
    realtime: bool,
}

impl Default for WavReplay {
    fn default() -> Self {
        Self {
            block_frames: DEFAULT_BLOCK_FRAMES,
            realtime: true,
        }
    }
}

impl WavReplay {
    pub fn new(block_frames: usize, realtime: bool) -> Self {
        Self {
            block_frames: block_frames.max(1),
            realtime,
        }
    }

    /// Replay a file until it ends or `cancel` is raised
    pub fn play_file(
        &self,
        engine: &SpectrumEngine,
        path: impl AsRef<Path>,
        cancel: &AtomicBool,
    ) -> Result<ReplaySummary, CaptureError> {
        let reader = WavReader::open(path.as_ref())?;
        info!("Replaying {}", path.as_ref().display());
        self.play(engine, reader, cancel)
    }

    /// Replay from any WAV reader. The file layout must match the engine.
    pub fn play<R: Read>(
        &self,
        engine: &SpectrumEngine,
        reader: WavReader<R>,
        cancel: &AtomicBool,
    ) -> Result<ReplaySummary, CaptureError> {
        let spec = reader.spec();
        let config = engine.config();
        if spec.sample_rate != config.sample_rate_hz || spec.channels != config.channels {
            return Err(CaptureError::WavMismatch {
                found_rate: spec.sample_rate,
                found_channels: spec.channels,
                rate: config.sample_rate_hz,
                channels: config.channels,
            });
        }

        let channels = spec.channels as usize;
        let block_len = self.block_frames * channels;
        let block_period = Duration::from_secs_f64(self.block_frames as f64 / spec.sample_rate as f64);

        let samples = decode_samples(reader)?;

        engine.set_capture_active(true);
        let started = Instant::now();
        let mut blocks = 0;
        let mut frames = 0;

        for block in samples.chunks(block_len) {
            if cancel.load(Ordering::Relaxed) {
                debug!("Replay cancelled after {blocks} blocks");
                break;
            }
            engine.ingest(block);
            blocks += 1;
            frames += block.len() / channels;

            if self.realtime {
                let due = started + block_period * blocks as u32;
                let now = Instant::now();
                if due > now {
                    thread::sleep(due - now);
                }
            }
        }
        engine.set_capture_active(false);

        Ok(ReplaySummary {
            blocks,
            frames,
            duration_secs: frames as f32 / spec.sample_rate as f32,
        })
    }
}

/// Read every sample as f32 in [-1, 1]
fn decode_samples<R: Read>(reader: WavReader<R>) -> Result<Vec<f32>, CaptureError> {
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(samples)
}
