//! Peak caps with hold time and gravity release.

use crate::params::MAX_BARS;

/// Per-band phase of a peak cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakState {
    /// Just rose, or still inside its hold window
    RisingOrHeld,
    /// Hold expired; falling by the decay rate each update
    Decaying,
}

/// Held maxima for up to `MAX_BARS` bands.
///
/// A peak only changes by rising to a new band value or by falling at the
/// decay rate; `reset` is the only way to drop it further.
#[derive(Debug, Clone)]
pub struct PeakTracker {
    levels: [f32; MAX_BARS],
    hold: [u32; MAX_BARS],
}

impl Default for PeakTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PeakTracker {
    pub fn new() -> Self {
        Self {
            levels: [0.0; MAX_BARS],
            hold: [0; MAX_BARS],
        }
    }

    /// Advance the first `bands.len()` peaks by one frame.
    ///
    /// A band above its peak lifts it and restarts the hold window. Otherwise
    /// the hold counter ticks down, and once it is exhausted the peak falls by
    /// `decay` but never below the band value or zero.
    pub fn update(&mut self, bands: &[f32], hold_frames: u32, decay: f32) {
        let live = bands.len().min(MAX_BARS);
        for i in 0..live {
            let band = bands[i];
            let peak = &mut self.levels[i];
            let hold = &mut self.hold[i];

            if band > *peak {
                *peak = band;
                *hold = hold_frames;
            } else if *hold > 0 {
                *hold -= 1;
            } else if *peak > band {
                *peak = (*peak - decay).max(band).max(0.0);
            }
        }
    }

    /// All peak levels, live or not
    pub fn levels(&self) -> &[f32; MAX_BARS] {
        &self.levels
    }

    pub fn level(&self, band: usize) -> f32 {
        self.levels[band]
    }

    /// Frames left before band `band` starts to fall
    pub fn hold_remaining(&self, band: usize) -> u32 {
        self.hold[band]
    }

    pub fn state(&self, band: usize) -> PeakState {
        if self.hold[band] > 0 {
            PeakState::RisingOrHeld
        } else {
            PeakState::Decaying
        }
    }

    pub fn reset(&mut self) {
        self.levels.fill(0.0);
        self.hold.fill(0);
    }
}
