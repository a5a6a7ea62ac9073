//! Spectral transform: sample history, mono downmix, Hann window and FFT.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Sliding-window magnitude spectrum over the most recent `size` mono samples.
///
/// All buffers are sized at construction; `process` never allocates.
pub struct SpectralTransform {
    size: usize,
    channels: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,

    /// Circular history of mono samples
    ring: Vec<f32>,
    write_pos: usize,
    filled: usize,

    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl SpectralTransform {
    /// `size` must be a power of two (checked by `EngineConfig::validate`)
    pub fn new(size: usize, channels: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            size,
            channels: channels.max(1),
            window: (0..size).map(|i| hann_window(i, size)).collect(),
            fft,
            ring: vec![0.0; size],
            write_pos: 0,
            filled: 0,
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch,
            magnitudes: vec![0.0; size / 2],
        }
    }

    /// True once a full window of samples has been seen
    pub fn is_primed(&self) -> bool {
        self.filled >= self.size
    }

    /// Append an interleaved block. Returns the number of complete frames
    /// consumed; a trailing partial frame is dropped.
    pub fn push_block(&mut self, samples: &[f32]) -> usize {
        let frames = samples.len() / self.channels;
        if frames == 0 {
            return 0;
        }

        // Only the newest `size` frames can reach the window
        let skip = frames.saturating_sub(self.size);
        let scale = 1.0 / self.channels as f32;

        for frame in samples.chunks_exact(self.channels).skip(skip) {
            let sum: f32 = frame
                .iter()
                .map(|&s| if s.is_finite() { s } else { 0.0 })
                .sum();
            self.ring[self.write_pos] = sum * scale;
            self.write_pos = (self.write_pos + 1) % self.size;
        }

        self.filled = (self.filled + frames).min(self.size);
        frames
    }

    /// Window and transform the current history. `None` until primed.
    pub fn compute(&mut self) -> Option<&[f32]> {
        if !self.is_primed() {
            return None;
        }

        // Oldest sample sits at write_pos
        let (newer, older) = self.ring.split_at(self.write_pos);
        for (i, &sample) in older.iter().chain(newer.iter()).enumerate() {
            self.buffer[i] = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (mag, bin) in self.magnitudes.iter_mut().zip(self.buffer.iter()) {
            *mag = bin.norm();
        }

        Some(&self.magnitudes)
    }

    /// Push a block and recompute once. `None` for an empty block or while
    /// the history is still filling.
    pub fn process(&mut self, samples: &[f32]) -> Option<&[f32]> {
        if self.push_block(samples) == 0 {
            return None;
        }
        self.compute()
    }

    /// Last computed magnitudes (zeros before the first transform)
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    pub fn clear(&mut self) {
        self.ring.fill(0.0);
        self.magnitudes.fill(0.0);
        self.write_pos = 0;
        self.filled = 0;
    }
}

/// Hann window function for FFT analysis
pub fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}
