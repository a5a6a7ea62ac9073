//! VFD Visualizer library - real-time audio spectrum engine

pub mod audio;
pub mod cli;
pub mod error;
pub mod meter;
pub mod params;

pub use audio::{BandView, SpectrumEngine};
pub use error::{CaptureError, ConfigError};
pub use params::{EngineConfig, MAX_BARS};
