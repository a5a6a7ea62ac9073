//! Logarithmic band layout and bin-to-band aggregation.

use crate::params::{EngineConfig, MAX_BARS};

/// Lowest frequency shown on the axis (Hz)
pub const MIN_FREQ_HZ: f32 = 20.0;

/// Highest frequency shown on the axis (Hz), capped at Nyquist
pub const MAX_FREQ_HZ: f32 = 20_000.0;

/// Fixed frequency-axis labels
pub const FREQUENCY_TICKS: [(f32, &str); 7] = [
    (20.0, "20Hz"),
    (100.0, "100Hz"),
    (500.0, "500Hz"),
    (1_000.0, "1kHz"),
    (5_000.0, "5kHz"),
    (10_000.0, "10kHz"),
    (20_000.0, "20kHz"),
];

/// Frequency span and covered bins of one bar
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandRange {
    pub low_hz: f32,
    pub high_hz: f32,
    /// First covered bin
    pub first_bin: usize,
    /// One past the last covered bin (equal to `first_bin` when empty)
    pub end_bin: usize,
    /// Bin read when the band covers none
    pub fallback_bin: usize,
}

impl BandRange {
    pub fn is_empty(&self) -> bool {
        self.end_bin <= self.first_bin
    }

    pub fn contains_hz(&self, hz: f32) -> bool {
        hz >= self.low_hz && hz < self.high_hz
    }
}

/// Maps linear FFT bins onto `num_bars` log-spaced bands.
///
/// The layout is a pure function of (sample rate, transform size, bar count)
/// and is cached in a fixed array; changing the bar count recomputes it in
/// place without allocating.
#[derive(Debug, Clone)]
pub struct BandMapper {
    resolution_hz: f32,
    num_bins: usize,
    transform_size: usize,
    min_hz: f32,
    max_hz: f32,
    num_bars: usize,
    ranges: [BandRange; MAX_BARS],
}

impl BandMapper {
    pub fn new(config: &EngineConfig, num_bars: usize) -> Self {
        let mut mapper = Self {
            resolution_hz: config.bin_resolution_hz(),
            num_bins: config.num_bins(),
            transform_size: config.transform_size,
            min_hz: MIN_FREQ_HZ.min(config.nyquist_hz() * 0.5),
            max_hz: MAX_FREQ_HZ.min(config.nyquist_hz()),
            num_bars: 0,
            ranges: [BandRange::default(); MAX_BARS],
        };
        mapper.set_num_bars(num_bars);
        mapper
    }

    pub fn num_bars(&self) -> usize {
        self.num_bars
    }

    /// Live band layout
    pub fn ranges(&self) -> &[BandRange] {
        &self.ranges[..self.num_bars]
    }

    /// Recompute the layout if the bar count changed
    pub fn set_num_bars(&mut self, num_bars: usize) {
        let num_bars = num_bars.clamp(1, MAX_BARS);
        if num_bars == self.num_bars {
            return;
        }
        self.num_bars = num_bars;

        let resolution = self.resolution_hz;
        let last_bin = self.num_bins - 1;
        let ratio = self.max_hz / self.min_hz;

        for i in 0..num_bars {
            let low_hz = self.min_hz * ratio.powf(i as f32 / num_bars as f32);
            let high_hz = self.min_hz * ratio.powf((i + 1) as f32 / num_bars as f32);

            // Bin k belongs here when low <= k * resolution < high
            let first_bin = ((low_hz / resolution).ceil() as usize).clamp(1, last_bin + 1);
            let end_bin = if i + 1 == num_bars {
                // Top band also takes the bin sitting exactly on max_hz
                (high_hz / resolution).floor() as usize + 1
            } else {
                (high_hz / resolution).ceil() as usize
            };
            let end_bin = end_bin.min(last_bin + 1).max(first_bin);

            let center_hz = (low_hz * high_hz).sqrt();
            let fallback_bin = ((center_hz / resolution).round() as usize).clamp(1, last_bin);

            self.ranges[i] = BandRange {
                low_hz,
                high_hz,
                first_bin,
                end_bin,
                fallback_bin,
            };
        }
    }

    /// Aggregate bins into live bands: max of covered bins, scaled by
    /// `gain * 2 / transform_size` and clamped to [0, 1].
    pub fn map(&self, magnitudes: &[f32], gain: f32, out: &mut [f32]) {
        let scale = gain * self.normalization();

        for (range, slot) in self.ranges().iter().zip(out.iter_mut()) {
            let raw = if range.is_empty() {
                magnitudes.get(range.fallback_bin).copied().unwrap_or(0.0)
            } else {
                magnitudes
                    .get(range.first_bin..range.end_bin)
                    .map(|bins| bins.iter().copied().fold(0.0, f32::max))
                    .unwrap_or(0.0)
            };
            *slot = (raw * scale).clamp(0.0, 1.0);
        }
    }

    /// Fixed scale turning a bin magnitude into sine amplitude
    pub fn normalization(&self) -> f32 {
        2.0 / self.transform_size as f32
    }

    /// Index of the live band whose range contains `hz`
    pub fn band_for_hz(&self, hz: f32) -> Option<usize> {
        let last = self.num_bars.checked_sub(1)?;
        self.ranges()
            .iter()
            .position(|r| r.contains_hz(hz))
            .or_else(|| (hz == self.ranges[last].high_hz).then_some(last))
    }

    /// Horizontal position of `hz` on the log axis, 0.0 at the left edge of
    /// the first bar and 1.0 at the right edge of the last
    pub fn axis_position(&self, hz: f32) -> f32 {
        let hz = hz.clamp(self.min_hz, self.max_hz);
        (hz / self.min_hz).ln() / (self.max_hz / self.min_hz).ln()
    }

    /// Axis labels that fall inside the displayed range, with positions
    pub fn ticks(&self) -> impl Iterator<Item = (f32, &'static str)> + '_ {
        FREQUENCY_TICKS
            .into_iter()
            .filter(|(hz, _)| *hz >= self.min_hz && *hz <= self.max_hz)
            .map(|(hz, label)| (self.axis_position(hz), label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::new(1024, 64, 48_000)
    }

    #[test]
    fn test_bands_are_contiguous_and_logarithmic() {
        for bars in [16, 32, 64] {
            let mapper = BandMapper::new(&config(), bars);
            let ranges = mapper.ranges();
            assert_eq!(ranges.len(), bars);
            assert!((ranges[0].low_hz - 20.0).abs() < 1e-3);
            assert!((ranges[bars - 1].high_hz - 20_000.0).abs() < 1.0);

            let ratio = ranges[0].high_hz / ranges[0].low_hz;
            for pair in ranges.windows(2) {
                assert!((pair[0].high_hz - pair[1].low_hz).abs() < 1e-2);
                assert!((pair[1].high_hz / pair[1].low_hz - ratio).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_bins_partition_without_overlap() {
        let mapper = BandMapper::new(&config(), 64);
        let mut next = mapper.ranges()[0].first_bin;
        for range in mapper.ranges() {
            assert_eq!(range.first_bin, next);
            next = range.end_bin;
        }
    }

    #[test]
    fn test_narrow_low_bands_use_nearest_bin() {
        // 46.875 Hz bins are wider than the lowest bands at 64 bars
        let mapper = BandMapper::new(&config(), 64);
        let empty: Vec<_> = mapper.ranges().iter().filter(|r| r.is_empty()).collect();
        assert!(!empty.is_empty());
        for range in empty {
            let center = (range.low_hz * range.high_hz).sqrt();
            let bin_hz = range.fallback_bin as f32 * 46.875;
            // Bin 0 (DC) is never read, so bin 1 is the floor
            assert!(range.fallback_bin == 1 || (bin_hz - center).abs() <= 46.875 / 2.0 + 1e-3);
        }

        let mut mags = vec![0.0; 512];
        mags[1] = 256.0;
        let mut out = [0.0; 64];
        mapper.map(&mags, 1.0, &mut out);
        assert!(out[0] > 0.0, "lowest band should borrow bin 1");
    }

    #[test]
    fn test_map_scales_and_clamps() {
        let mapper = BandMapper::new(&config(), 16);
        let band = mapper.band_for_hz(1_000.0).unwrap();
        let bin = mapper.ranges()[band].first_bin;

        let mut mags = vec![0.0; 512];
        mags[bin] = 128.0;
        let mut out = [0.0; 16];

        mapper.map(&mags, 1.0, &mut out);
        assert!((out[band] - 0.25).abs() < 1e-6);

        mapper.map(&mags, 20.0, &mut out);
        assert_eq!(out[band], 1.0);
        assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_bar_count_change_recomputes_layout() {
        let mut mapper = BandMapper::new(&config(), 64);
        let fine = mapper.band_for_hz(1_000.0).unwrap();
        mapper.set_num_bars(16);
        assert_eq!(mapper.ranges().len(), 16);
        let coarse = mapper.band_for_hz(1_000.0).unwrap();
        assert!(coarse < fine);
        assert!(mapper.ranges()[coarse].contains_hz(1_000.0));
    }

    #[test]
    fn test_ticks_span_axis() {
        let mapper = BandMapper::new(&config(), 32);
        let ticks: Vec<_> = mapper.ticks().collect();
        assert_eq!(ticks.len(), 7);
        assert_eq!(ticks[0], (0.0, "20Hz"));
        assert!((ticks[6].0 - 1.0).abs() < 1e-6);
        assert!(ticks.windows(2).all(|w| w[0].0 < w[1].0));
        // Geometric midpoint of 20 Hz..20 kHz
        assert!((mapper.axis_position(632.46) - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_low_sample_rate_caps_axis_at_nyquist() {
        let mapper = BandMapper::new(&EngineConfig::new(1024, 64, 16_000), 32);
        let top = mapper.ranges()[31];
        assert!((top.high_hz - 8_000.0).abs() < 1.0);
        assert!(top.end_bin <= 512);
        assert_eq!(mapper.ticks().count(), 5);
    }
}
