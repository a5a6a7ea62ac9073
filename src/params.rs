//! Engine configuration and the live parameter store.
//!
//! Values carry their units and documented ranges:
//! - Configuration is fixed at setup and validated once
//! - Parameters are user knobs, clamped silently and stored lock-free
//! - Defaults match the shipped visualizer tuning

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::error::ConfigError;

/// Compile-time capacity of the band and peak buffers
pub const MAX_BARS: usize = 64;

/// Smallest bar count a configuration may be sized for
pub const MIN_BARS: usize = 16;

/// Supported transform sizes (inclusive)
pub const MIN_TRANSFORM_SIZE: usize = 64;
pub const MAX_TRANSFORM_SIZE: usize = 32768;

/// Documented parameter ranges for UI controls
pub mod ranges {
    use std::ops::RangeInclusive;

    /// Linear gain multiplier
    pub const GAIN: RangeInclusive<f32> = 1.0..=100.0;

    /// EMA weight of the previous value (0 = instant response)
    pub const SMOOTHING: RangeInclusive<f32> = 0.0..=0.99;

    /// Per-frame fall amount for bars and peaks
    pub const GRAVITY: RangeInclusive<f32> = 0.001..=0.02;

    /// Frames a peak cap is frozen after rising
    pub const HOLD_FRAMES: RangeInclusive<u32> = 0..=120;
}

/// Default tuning
pub mod defaults {
    pub const GAIN: f32 = 20.0;
    pub const SMOOTHING: f32 = 0.70;
    pub const GRAVITY: f32 = 0.005;
    pub const HOLD_FRAMES: u32 = 30;
    pub const BARS: usize = 32;
}

/// Fixed engine setup, validated before any buffer is allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// FFT window size (must be power of 2)
    pub transform_size: usize,

    /// Number of bars the buffers must be able to serve (16..=MAX_BARS)
    pub max_bars: usize,

    /// Input sample rate (Hz)
    pub sample_rate_hz: u32,

    /// Interleaved channels per frame, downmixed to mono
    pub channels: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transform_size: 1024,
            max_bars: MAX_BARS,
            sample_rate_hz: 48_000,
            channels: 2,
        }
    }
}

impl EngineConfig {
    pub fn new(transform_size: usize, max_bars: usize, sample_rate_hz: u32) -> Self {
        Self {
            transform_size,
            max_bars,
            sample_rate_hz,
            ..Self::default()
        }
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    /// Number of magnitude bins produced per transform
    pub fn num_bins(&self) -> usize {
        self.transform_size / 2
    }

    /// Width of one bin (Hz)
    pub fn bin_resolution_hz(&self) -> f32 {
        self.sample_rate_hz as f32 / self.transform_size as f32
    }

    pub fn nyquist_hz(&self) -> f32 {
        self.sample_rate_hz as f32 / 2.0
    }

    /// Validate configuration (transform size must be power of 2, etc.)
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.transform_size.is_power_of_two() {
            return Err(ConfigError::TransformNotPowerOfTwo(self.transform_size));
        }
        if !(MIN_TRANSFORM_SIZE..=MAX_TRANSFORM_SIZE).contains(&self.transform_size) {
            return Err(ConfigError::TransformSizeOutOfRange {
                size: self.transform_size,
                min: MIN_TRANSFORM_SIZE,
                max: MAX_TRANSFORM_SIZE,
            });
        }
        if !(MIN_BARS..=MAX_BARS).contains(&self.max_bars) {
            return Err(ConfigError::BarCapacity {
                requested: self.max_bars,
                min: MIN_BARS,
                capacity: MAX_BARS,
            });
        }
        if self.sample_rate_hz == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.channels == 0 {
            return Err(ConfigError::ZeroChannels);
        }
        Ok(())
    }
}

/// Supported bar counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BarCount {
    Sixteen,
    ThirtyTwo,
    SixtyFour,
}

impl BarCount {
    pub const ALL: [BarCount; 3] = [BarCount::Sixteen, BarCount::ThirtyTwo, BarCount::SixtyFour];

    pub fn count(self) -> usize {
        match self {
            BarCount::Sixteen => 16,
            BarCount::ThirtyTwo => 32,
            BarCount::SixtyFour => 64,
        }
    }

    /// Snap an arbitrary request to the closest supported count that fits
    /// within `capacity`. Ties go to the smaller count.
    pub fn nearest(requested: usize, capacity: usize) -> BarCount {
        let mut best = BarCount::Sixteen;
        for candidate in Self::ALL {
            if candidate.count() > capacity {
                break;
            }
            if candidate.count().abs_diff(requested) < best.count().abs_diff(requested) {
                best = candidate;
            }
        }
        best
    }
}

/// `f32` stored as its bit pattern, for lock-free sharing with the audio thread
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Values read once at the top of each pipeline pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSnapshot {
    pub gain: f32,
    pub smoothing: f32,
    pub gravity: f32,
    pub num_bars: usize,
    pub hold_frames: u32,
}

/// Tunable parameters, written from the UI thread and read by the pipeline.
///
/// Every field is an independent relaxed atomic: a reader sees either the
/// old or the new value of each knob, never a torn one.
#[derive(Debug)]
pub struct EngineParams {
    gain: AtomicF32,
    smoothing: AtomicF32,
    gravity: AtomicF32,
    num_bars: AtomicUsize,
    hold_frames: AtomicU32,
    bar_capacity: usize,
}

impl EngineParams {
    pub fn new(bar_capacity: usize) -> Self {
        Self {
            gain: AtomicF32::new(defaults::GAIN),
            smoothing: AtomicF32::new(defaults::SMOOTHING),
            gravity: AtomicF32::new(defaults::GRAVITY),
            num_bars: AtomicUsize::new(BarCount::nearest(defaults::BARS, bar_capacity).count()),
            hold_frames: AtomicU32::new(defaults::HOLD_FRAMES),
            bar_capacity,
        }
    }

    pub fn set_gain(&self, value: f32) {
        if let Some(v) = clamp_finite(value, ranges::GAIN) {
            self.gain.store(v);
        }
    }

    pub fn set_smoothing(&self, value: f32) {
        if let Some(v) = clamp_finite(value, ranges::SMOOTHING) {
            self.smoothing.store(v);
        }
    }

    pub fn set_gravity(&self, value: f32) {
        if let Some(v) = clamp_finite(value, ranges::GRAVITY) {
            self.gravity.store(v);
        }
    }

    /// Returns the bar count actually applied
    pub fn set_num_bars(&self, value: usize) -> usize {
        let count = BarCount::nearest(value, self.bar_capacity).count();
        self.num_bars.store(count, Ordering::Relaxed);
        count
    }

    pub fn set_hold_frames(&self, value: u32) {
        let v = value.clamp(*ranges::HOLD_FRAMES.start(), *ranges::HOLD_FRAMES.end());
        self.hold_frames.store(v, Ordering::Relaxed);
    }

    pub fn gain(&self) -> f32 {
        self.gain.load()
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing.load()
    }

    pub fn gravity(&self) -> f32 {
        self.gravity.load()
    }

    pub fn num_bars(&self) -> usize {
        self.num_bars.load(Ordering::Relaxed)
    }

    pub fn hold_frames(&self) -> u32 {
        self.hold_frames.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            gain: self.gain(),
            smoothing: self.smoothing(),
            gravity: self.gravity(),
            num_bars: self.num_bars(),
            hold_frames: self.hold_frames(),
        }
    }
}

/// Clamp into `range`, rejecting NaN and infinities
fn clamp_finite(value: f32, range: RangeInclusive<f32>) -> Option<f32> {
    value
        .is_finite()
        .then(|| value.clamp(*range.start(), *range.end()))
}
