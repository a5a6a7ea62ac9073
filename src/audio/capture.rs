//! Live capture: an input stream whose callback feeds the engine directly.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use log::{error, info, warn};
use std::sync::Arc;

use super::engine::SpectrumEngine;
use crate::error::CaptureError;

/// Converted-sample buffer reserved up front for the callback
const CONVERSION_CAPACITY: usize = 16_384;

/// Running capture stream bound to an engine.
///
/// Dropping the session (or calling `stop`) tears down the stream before the
/// engine is told capture has ended, so no callback can run afterwards.
pub struct CaptureSession {
    engine: Arc<SpectrumEngine>,
    stream: Option<cpal::Stream>,
    device_name: String,
}

impl CaptureSession {
    /// Open an input device (first whose name contains `device_hint`, else
    /// the default) at the engine's sample rate and channel count and start
    /// streaming into `engine.ingest`.
    pub fn start(
        engine: Arc<SpectrumEngine>,
        device_hint: Option<&str>,
    ) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = pick_input_device(&host, device_hint)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let rate = engine.config().sample_rate_hz;
        let channels = engine.config().channels;
        let (config, format) = select_stream_config(&device, rate, channels)?;

        info!(
            "Audio capture: {} @ {}Hz, {} ch, {:?}",
            device_name, rate, channels, format
        );

        let stream = build_input_stream(&device, &config, format, Arc::clone(&engine))?;
        stream.play()?;
        engine.set_capture_active(true);

        Ok(Self {
            engine,
            stream: Some(stream),
            device_name,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Stop streaming. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("Failed to pause capture stream: {}", e);
            }
            // Dropping the stream unregisters the callback
            drop(stream);
            self.engine.set_capture_active(false);
            info!("Audio capture stopped ({})", self.device_name);
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Names of the available input devices
pub fn list_input_devices() -> Result<Vec<String>, CaptureError> {
    let host = cpal::default_host();
    Ok(host
        .input_devices()?
        .filter_map(|device| device.name().ok())
        .collect())
}

fn pick_input_device(
    host: &cpal::Host,
    hint: Option<&str>,
) -> Result<cpal::Device, CaptureError> {
    match hint {
        Some(hint) => {
            let needle = hint.to_lowercase();
            host.input_devices()?
                .find(|device| {
                    device
                        .name()
                        .map(|name| name.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                })
                .ok_or_else(|| CaptureError::DeviceNotFound(hint.to_string()))
        }
        None => host.default_input_device().ok_or(CaptureError::NoDevice),
    }
}

fn select_stream_config(
    device: &cpal::Device,
    rate: u32,
    channels: u16,
) -> Result<(StreamConfig, SampleFormat), CaptureError> {
    let ranges: Vec<_> = device
        .supported_input_configs()?
        .filter(|range| {
            range.channels() == channels
                && range.min_sample_rate().0 <= rate
                && range.max_sample_rate().0 >= rate
        })
        .collect();

    // Prefer float input; fall back to any integer format we can convert
    let chosen = ranges
        .iter()
        .find(|range| range.sample_format() == SampleFormat::F32)
        .or_else(|| ranges.iter().find(|range| is_convertible(range.sample_format())))
        .ok_or(CaptureError::UnsupportedConfig {
            sample_rate: rate,
            channels,
        })?;

    let supported = chosen.clone().with_sample_rate(SampleRate(rate));
    Ok((supported.config(), supported.sample_format()))
}

fn is_convertible(format: SampleFormat) -> bool {
    matches!(
        format,
        SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
    )
}

fn build_input_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    format: SampleFormat,
    engine: Arc<SpectrumEngine>,
) -> Result<cpal::Stream, CaptureError> {
    let err_fn = |err: cpal::StreamError| error!("Audio stream error: {}", err);

    let stream = match format {
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| engine.ingest(data),
            err_fn,
            None,
        )?,
        SampleFormat::I16 => {
            let mut converted = Vec::with_capacity(CONVERSION_CAPACITY);
            device.build_input_stream(
                config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    convert_into(data, &mut converted, i16_to_f32);
                    engine.ingest(&converted);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::U16 => {
            let mut converted = Vec::with_capacity(CONVERSION_CAPACITY);
            device.build_input_stream(
                config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    convert_into(data, &mut converted, u16_to_f32);
                    engine.ingest(&converted);
                },
                err_fn,
                None,
            )?
        }
        other => return Err(CaptureError::UnsupportedFormat(format!("{other:?}"))),
    };
    Ok(stream)
}

/// Refill `out` from `data`; only allocates when a block outgrows the
/// reserved capacity
fn convert_into<T: Copy>(data: &[T], out: &mut Vec<f32>, convert: fn(T) -> f32) {
    out.clear();
    out.extend(data.iter().map(|&s| convert(s)));
}

fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / i16::MAX as f32
}

fn u16_to_f32(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}
