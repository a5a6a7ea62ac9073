//! Spectrum engine: owns the pipeline state, the parameter store and the
//! published band/peak buffers.
//!
//! Three contexts share one `Arc<SpectrumEngine>`:
//! - the capture callback calls `ingest`
//! - the UI thread calls the setters
//! - the decay timer calls `run_decay_step`, and the renderer reads the views
//!
//! Neither `ingest` nor `run_decay_step` ever waits on a lock. Each guards its
//! mutable state with `try_lock` and skips that pass if it is already taken.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use log::info;

use super::bands::{BandMapper, BandRange};
use super::fft::SpectralTransform;
use super::peaks::PeakTracker;
use super::smoothing::{fall, smooth_in_place};
use crate::error::ConfigError;
use crate::params::{AtomicF32, EngineConfig, EngineParams, MAX_BARS};

/// Bars fall twice as fast as peaks when driven by the decay timer
const DECAY_BAR_RATE: f32 = 2.0;
const DECAY_PEAK_RATE: f32 = 1.0;

/// Analysis state touched only by `ingest`
struct FrontEnd {
    transform: SpectralTransform,
    mapper: BandMapper,
    raw: [f32; MAX_BARS],
}

/// Band and peak state shared by `ingest` and `run_decay_step`
struct Dynamics {
    bands: [f32; MAX_BARS],
    peaks: PeakTracker,
}

/// Read-only, lock-free view over a published buffer.
///
/// Reads may interleave with a concurrent update; a value is never torn but
/// neighbouring bars can come from different frames.
#[derive(Clone, Copy)]
pub struct BandView<'a> {
    cells: &'a [AtomicF32],
}

impl<'a> BandView<'a> {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.cells.get(index).map(AtomicF32::load)
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + 'a {
        self.cells.iter().map(AtomicF32::load)
    }

    /// Copy into `out`, returning the number of values written
    pub fn copy_to(&self, out: &mut [f32]) -> usize {
        let mut written = 0;
        for (slot, cell) in out.iter_mut().zip(self.cells) {
            *slot = cell.load();
            written += 1;
        }
        written
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.iter().collect()
    }
}

impl std::fmt::Debug for BandView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Real-time spectrum analyzer with smoothed bars and peak caps
pub struct SpectrumEngine {
    config: EngineConfig,
    params: EngineParams,

    front: Mutex<FrontEnd>,
    dynamics: Mutex<Dynamics>,

    /// Published outputs, always `MAX_BARS` long
    band_out: [AtomicF32; MAX_BARS],
    peak_out: [AtomicF32; MAX_BARS],

    /// Set by capture sources while audio is streaming
    capture_active: AtomicBool,
}

impl SpectrumEngine {
    /// Validate `config` and allocate every buffer the pipeline will use
    pub fn configure(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let params = EngineParams::new(config.max_bars);
        let front = FrontEnd {
            transform: SpectralTransform::new(config.transform_size, config.channels as usize),
            mapper: BandMapper::new(&config, params.num_bars()),
            raw: [0.0; MAX_BARS],
        };

        info!(
            "Spectrum engine: {}-point FFT @ {} Hz, {} ch, up to {} bars",
            config.transform_size, config.sample_rate_hz, config.channels, config.max_bars
        );

        Ok(Self {
            config,
            params,
            front: Mutex::new(front),
            dynamics: Mutex::new(Dynamics {
                bands: [0.0; MAX_BARS],
                peaks: PeakTracker::new(),
            }),
            band_out: std::array::from_fn(|_| AtomicF32::default()),
            peak_out: std::array::from_fn(|_| AtomicF32::default()),
            capture_active: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn set_gain(&self, value: f32) {
        self.params.set_gain(value);
    }

    pub fn set_smoothing(&self, value: f32) {
        self.params.set_smoothing(value);
    }

    pub fn set_gravity(&self, value: f32) {
        self.params.set_gravity(value);
    }

    /// Snap to a supported bar count; the band layout follows on the next
    /// `ingest`. Returns the count applied.
    pub fn set_num_bars(&self, value: usize) -> usize {
        self.params.set_num_bars(value)
    }

    pub fn set_hold_time(&self, frames: u32) {
        self.params.set_hold_frames(frames);
    }

    /// Currently active bar count
    pub fn num_bars(&self) -> usize {
        self.params.num_bars()
    }

    /// Feed one block of interleaved samples and run the full pipeline once.
    ///
    /// Safe to call from a real-time callback: no allocation, no waiting.
    /// Empty or partial-frame blocks leave every buffer untouched.
    pub fn ingest(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        let Some(mut front) = try_acquire(&self.front) else {
            return;
        };
        let p = self.params.snapshot();
        let n = p.num_bars;

        let FrontEnd {
            transform,
            mapper,
            raw,
        } = &mut *front;

        mapper.set_num_bars(n);
        let Some(magnitudes) = transform.process(samples) else {
            return;
        };
        mapper.map(magnitudes, p.gain, &mut raw[..n]);

        // Decay step in flight; the history still advanced above
        let Some(mut dynamics) = try_acquire(&self.dynamics) else {
            return;
        };
        let Dynamics { bands, peaks } = &mut *dynamics;

        smooth_in_place(&mut bands[..n], &raw[..n], p.smoothing);
        peaks.update(&bands[..n], p.hold_frames, p.gravity);
        self.publish(bands, peaks, n);
    }

    /// One decay-only frame: bars fall at twice gravity, peaks run their
    /// hold/decay cycle at gravity. Skipped if `ingest` holds the state.
    pub fn run_decay_step(&self) {
        let Some(mut dynamics) = try_acquire(&self.dynamics) else {
            return;
        };
        let p = self.params.snapshot();
        let n = p.num_bars;
        let Dynamics { bands, peaks } = &mut *dynamics;

        fall(&mut bands[..n], p.gravity * DECAY_BAR_RATE);
        peaks.update(&bands[..n], p.hold_frames, p.gravity * DECAY_PEAK_RATE);
        self.publish(bands, peaks, n);
    }

    /// Smoothed magnitudes of the active bars
    pub fn snapshot_band_magnitudes(&self) -> BandView<'_> {
        BandView {
            cells: &self.band_out[..self.num_bars()],
        }
    }

    /// Peak caps of the active bars
    pub fn snapshot_peak_levels(&self) -> BandView<'_> {
        BandView {
            cells: &self.peak_out[..self.num_bars()],
        }
    }

    /// Whole band buffer including inactive tail entries
    pub fn band_buffer(&self) -> BandView<'_> {
        BandView {
            cells: &self.band_out,
        }
    }

    /// Whole peak buffer including inactive tail entries
    pub fn peak_buffer(&self) -> BandView<'_> {
        BandView {
            cells: &self.peak_out,
        }
    }

    /// Copy of the current band layout (takes the front-end lock briefly;
    /// not for the audio thread)
    pub fn band_layout(&self) -> Vec<BandRange> {
        match self.front.lock() {
            Ok(front) => front.mapper.ranges().to_vec(),
            Err(poisoned) => poisoned.into_inner().mapper.ranges().to_vec(),
        }
    }

    /// Index of the active band containing `hz`
    pub fn band_for_hz(&self, hz: f32) -> Option<usize> {
        let mapper = BandMapper::new(&self.config, self.num_bars());
        mapper.band_for_hz(hz)
    }

    /// Axis labels with their 0..1 positions for the current configuration
    pub fn frequency_ticks(&self) -> Vec<(f32, &'static str)> {
        BandMapper::new(&self.config, self.num_bars()).ticks().collect()
    }

    /// Drop all history, bars and peaks. Not for the audio thread.
    pub fn reset(&self) {
        let mut front = self.front.lock().unwrap_or_else(|e| e.into_inner());
        let mut dynamics = self.dynamics.lock().unwrap_or_else(|e| e.into_inner());

        front.transform.clear();
        dynamics.bands.fill(0.0);
        dynamics.peaks.reset();
        for (band, peak) in self.band_out.iter().zip(&self.peak_out) {
            band.store(0.0);
            peak.store(0.0);
        }
    }

    pub fn set_capture_active(&self, active: bool) {
        self.capture_active.store(active, Ordering::Release);
    }

    pub fn is_capture_active(&self) -> bool {
        self.capture_active.load(Ordering::Acquire)
    }

    fn publish(&self, bands: &[f32; MAX_BARS], peaks: &PeakTracker, n: usize) {
        for i in 0..n {
            self.band_out[i].store(bands[i]);
            self.peak_out[i].store(peaks.level(i));
        }
    }
}

/// Non-blocking lock that recovers from a poisoned mutex
fn try_acquire<T>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn engine(channels: u16) -> SpectrumEngine {
        SpectrumEngine::configure(EngineConfig::new(1024, 64, 48_000).with_channels(channels))
            .expect("valid config")
    }

    fn sine(freq_hz: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq_hz * i as f32 / 48_000.0).sin())
            .collect()
    }

    #[test]
    fn test_configure_rejects_invalid_setup() {
        assert!(matches!(
            SpectrumEngine::configure(EngineConfig::new(1000, 64, 48_000)),
            Err(ConfigError::TransformNotPowerOfTwo(1000))
        ));
        assert!(matches!(
            SpectrumEngine::configure(EngineConfig::new(1024, 128, 48_000)),
            Err(ConfigError::BarCapacity { .. })
        ));
    }

    #[test]
    fn test_empty_block_leaves_state_unchanged() {
        let engine = engine(1);
        engine.set_smoothing(0.0);
        engine.ingest(&sine(1_000.0, 1.0, 1024));
        let before = engine.band_buffer().to_vec();

        engine.ingest(&[]);
        assert_eq!(engine.band_buffer().to_vec(), before);
    }

    #[test]
    fn test_partial_frame_is_noop() {
        let engine = engine(2);
        engine.ingest(&[0.5]);
        assert!(engine.band_buffer().iter().all(|v| v == 0.0));
    }

    #[test]
    fn test_tone_band_dominates_for_every_bar_count() {
        for bars in [16, 32, 64] {
            let engine = engine(1);
            engine.set_gain(1.0);
            engine.set_smoothing(0.0);
            assert_eq!(engine.set_num_bars(bars), bars);

            // Put the tone on the centre bin of the band holding ~2 kHz
            let layout = BandMapper::new(engine.config(), bars);
            let band = layout.band_for_hz(2_000.0).unwrap();
            let range = layout.ranges()[band];
            let bin = (range.first_bin + range.end_bin - 1) / 2;
            let freq = bin as f32 * engine.config().bin_resolution_hz();

            engine.ingest(&sine(freq, 0.5, 2048));
            let values = engine.snapshot_band_magnitudes().to_vec();
            assert_eq!(values.len(), bars);

            let target = values[band];
            assert!(target > 0.0);
            for (i, &v) in values.iter().enumerate() {
                if i != band {
                    assert!(v < target * 0.75, "bars={bars} band {i}: {v} vs {target}");
                }
            }
        }
    }

    #[test]
    fn test_tone_band_within_half_of_loudest_across_sweep() {
        // A tone just below a band edge can land nearest a bin owned by the
        // next band. The band holding the tone then reads a bin under one
        // bin away, which a Hann window keeps above half the loudest bar.
        const MARGIN: f32 = 0.45;
        let tones = 240;
        let (low, high) = (150.0_f32, 16_000.0_f32);

        for bars in [16, 32, 64] {
            let engine = engine(1);
            engine.set_gain(1.0);
            engine.set_smoothing(0.0);
            engine.set_num_bars(bars);

            for t in 0..tones {
                let freq = low * (high / low).powf(t as f32 / (tones - 1) as f32);
                let band = engine.band_for_hz(freq).unwrap();

                engine.ingest(&sine(freq, 0.5, 2048));
                let values = engine.snapshot_band_magnitudes().to_vec();
                let loudest = values.iter().copied().fold(0.0, f32::max);

                assert!(loudest > 0.0);
                assert!(
                    values[band] >= loudest * MARGIN,
                    "bars={bars} {freq:.1} Hz: band {band} at {} vs loudest {loudest}",
                    values[band]
                );
            }
        }
    }

    #[test]
    fn test_snapshots_follow_active_bar_count() {
        let engine = engine(1);
        assert_eq!(engine.snapshot_band_magnitudes().len(), 32);
        engine.set_num_bars(64);
        assert_eq!(engine.snapshot_peak_levels().len(), 64);
        assert_eq!(engine.band_buffer().len(), MAX_BARS);
    }

    #[test]
    fn test_shrinking_bar_count_keeps_tail_intact() {
        let engine = engine(1);
        engine.set_num_bars(64);
        engine.set_smoothing(0.0);
        engine.set_gain(100.0);
        engine.ingest(&sine(15_000.0, 1.0, 1024));
        let tail: Vec<f32> = engine.band_buffer().iter().skip(32).collect();
        assert!(tail.iter().any(|&v| v > 0.0));

        engine.set_num_bars(32);
        engine.ingest(&sine(300.0, 1.0, 1024));
        engine.run_decay_step();

        let after: Vec<f32> = engine.band_buffer().iter().skip(32).collect();
        assert_eq!(tail, after);
    }

    #[test]
    fn test_values_stay_in_unit_range() {
        let engine = engine(2);
        engine.set_gain(100.0);
        engine.set_smoothing(0.0);
        let loud: Vec<f32> = sine(440.0, 4.0, 4096);
        engine.ingest(&loud);
        for v in engine.band_buffer().iter().chain(engine.peak_buffer().iter()) {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_reset_clears_outputs() {
        let engine = engine(1);
        engine.set_smoothing(0.0);
        engine.ingest(&sine(1_000.0, 1.0, 1024));
        assert!(engine.snapshot_peak_levels().iter().any(|v| v > 0.0));

        engine.reset();
        assert!(engine.band_buffer().iter().all(|v| v == 0.0));
        assert!(engine.peak_buffer().iter().all(|v| v == 0.0));

        // History was cleared too: a short block is not enough to transform
        engine.ingest(&sine(1_000.0, 1.0, 512));
        assert!(engine.band_buffer().iter().all(|v| v == 0.0));
    }

    #[test]
    fn test_ticks_and_layout() {
        let engine = engine(1);
        assert_eq!(engine.frequency_ticks().len(), 7);
        assert_eq!(engine.band_layout().len(), 32);
        let band = engine.band_for_hz(1_000.0).unwrap();
        assert!(engine.band_layout()[band].contains_hz(1_000.0));
    }
}
