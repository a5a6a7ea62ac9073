//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::decay::{sanitize_rate, DEFAULT_DECAY_RATE_HZ};
use crate::meter::MeterStyle;
use crate::params::{defaults, EngineConfig, MAX_BARS};

const DEFAULT_TAIL_SECS: f32 = 2.0;
const MAX_TAIL_SECS: f32 = 60.0;
const MAX_FPS: f32 = 240.0;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "vfd-visualizer")]
#[command(about = "Real-time audio spectrum bars with peak caps", long_about = None)]
pub struct Args {
    /// FFT window size (power of two)
    #[arg(long, value_name = "SAMPLES", default_value_t = 1024)]
    pub fft_size: usize,

    /// Number of bars: 16, 32 or 64
    #[arg(long, value_name = "COUNT", default_value_t = defaults::BARS)]
    pub bars: usize,

    /// Linear gain (1-100)
    #[arg(long, default_value_t = defaults::GAIN)]
    pub gain: f32,

    /// Smoothing coefficient (0-0.99, higher is slower)
    #[arg(long, default_value_t = defaults::SMOOTHING)]
    pub smoothing: f32,

    /// Per-frame fall for bars and peaks (0.001-0.02)
    #[arg(long, default_value_t = defaults::GRAVITY)]
    pub gravity: f32,

    /// Frames a peak cap holds before falling (0-120)
    #[arg(long, value_name = "FRAMES", default_value_t = defaults::HOLD_FRAMES)]
    pub hold: u32,

    /// Input sample rate (Hz)
    #[arg(long, value_name = "HZ", default_value_t = 48_000)]
    pub sample_rate: u32,

    /// Interleaved input channels
    #[arg(long, default_value_t = 2)]
    pub channels: u16,

    /// Replay a WAV file instead of capturing live audio
    #[arg(long, value_name = "WAV")]
    pub input: Option<PathBuf>,

    /// Capture device (substring of its name)
    #[arg(long, value_name = "NAME")]
    pub device: Option<String>,

    /// List capture devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Stop capturing after this many seconds (runs until Ctrl-C otherwise)
    #[arg(long, value_name = "SECONDS")]
    pub seconds: Option<f32>,

    /// Keep drawing this long after capture stops, so bars fall to rest
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_TAIL_SECS)]
    pub tail: f32,

    /// Redraw and decay rate (Hz)
    #[arg(long, default_value_t = DEFAULT_DECAY_RATE_HZ)]
    pub fps: f32,

    /// Meter height in text rows
    #[arg(long, value_name = "ROWS", default_value_t = 12)]
    pub rows: usize,

    /// Hide peak caps
    #[arg(long)]
    pub no_peaks: bool,
}

impl Args {
    /// Engine configuration implied by the arguments
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            transform_size: self.fft_size,
            max_bars: MAX_BARS,
            sample_rate_hz: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Redraw and decay rate, bounded to what the decay driver accepts
    pub fn frame_rate(&self) -> f32 {
        sanitize_rate(self.fps).min(MAX_FPS)
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.frame_rate())
    }

    /// Time to keep drawing after the source stops
    pub fn tail_duration(&self) -> Duration {
        let secs = if self.tail.is_finite() {
            self.tail.clamp(0.0, MAX_TAIL_SECS)
        } else {
            DEFAULT_TAIL_SECS
        };
        Duration::from_secs_f32(secs)
    }

    /// Capture/replay time limit, if a usable one was given
    pub fn run_limit(&self) -> Option<Duration> {
        self.seconds
            .filter(|s| s.is_finite() && *s > 0.0)
            .and_then(|s| Duration::try_from_secs_f32(s).ok())
    }

    pub fn meter_style(&self) -> MeterStyle {
        MeterStyle {
            height: self.rows,
            show_peaks: !self.no_peaks,
            ..MeterStyle::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let args = Args::parse_from(["vfd-visualizer"]);
        assert_eq!(args.engine_config(), EngineConfig::default());
        assert_eq!(args.bars, 32);
        assert_eq!(args.hold, 30);
        assert!(args.meter_style().show_peaks);
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "vfd-visualizer",
            "--fft-size",
            "2048",
            "--bars",
            "64",
            "--channels",
            "1",
            "--input",
            "song.wav",
            "--no-peaks",
        ]);
        let config = args.engine_config();
        assert_eq!(config.transform_size, 2048);
        assert_eq!(config.channels, 1);
        assert_eq!(args.bars, 64);
        assert_eq!(args.input, Some(PathBuf::from("song.wav")));
        assert!(!args.meter_style().show_peaks);
    }

    #[test]
    fn test_timing_arguments_never_yield_invalid_durations() {
        for value in ["nan", "inf", "-inf", "1e-39", "0", "-3", "1e30"] {
            let args = Args::parse_from([
                "vfd-visualizer".to_string(),
                format!("--fps={value}"),
                format!("--tail={value}"),
                format!("--seconds={value}"),
            ]);
            let fps = args.frame_rate();
            assert!((1.0..=240.0).contains(&fps), "--fps {value} gave {fps}");
            assert!(args.frame_period() >= Duration::from_secs_f32(1.0 / 240.0));
            assert!(args.tail_duration() <= Duration::from_secs(60));
            if let Some(limit) = args.run_limit() {
                assert!(limit > Duration::ZERO);
            }
        }

        let args = Args::parse_from(["vfd-visualizer", "--fps", "nan", "--tail", "nan"]);
        assert_eq!(args.frame_rate(), DEFAULT_DECAY_RATE_HZ);
        assert_eq!(args.tail_duration(), Duration::from_secs(2));
        assert_eq!(args.run_limit(), None);
    }
}
