//! Real-time spectrum analysis and its audio sources.
//!
//! The engine turns raw sample blocks into smoothed log-spaced bars with
//! peak caps. Capture sources (live device or WAV replay) feed it, and the
//! decay driver keeps the display falling when they stop.

pub mod bands;
pub mod capture;
pub mod decay;
pub mod engine;
pub mod fft;
pub mod peaks;
pub mod smoothing;
pub mod wav;

// Re-export public types
pub use bands::{BandMapper, BandRange, FREQUENCY_TICKS};
pub use capture::CaptureSession;
pub use decay::DecayDriver;
pub use engine::{BandView, SpectrumEngine};
pub use fft::SpectralTransform;
pub use peaks::{PeakState, PeakTracker};
pub use wav::WavReplay;
