//! Fixed-rate timer that lets bars and peaks fall to rest while no audio is
//! being captured.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use super::engine::SpectrumEngine;

/// Default decay cadence (Hz), one step per display frame
pub const DEFAULT_DECAY_RATE_HZ: f32 = 60.0;

/// Accepted decay cadence (Hz)
pub const DECAY_RATE_RANGE_HZ: (f32, f32) = (1.0, 1_000.0);

/// Usable tick rate for `requested`; non-finite input falls back to the default
pub fn sanitize_rate(requested: f32) -> f32 {
    if requested.is_finite() {
        requested.clamp(DECAY_RATE_RANGE_HZ.0, DECAY_RATE_RANGE_HZ.1)
    } else {
        DEFAULT_DECAY_RATE_HZ
    }
}

/// Background decay thread, stopped and joined on drop
pub struct DecayDriver {
    running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl DecayDriver {
    /// Spawn the decay thread. Steps are skipped while the engine reports an
    /// active capture.
    pub fn spawn(engine: Arc<SpectrumEngine>, rate_hz: f32) -> Self {
        let rate_hz = sanitize_rate(rate_hz);
        let period = Duration::from_secs_f32(1.0 / rate_hz);
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = Arc::clone(&running);

        info!("Decay driver started at {rate_hz:.1} Hz");

        let thread = thread::Builder::new()
            .name("spectrum-decay".to_string())
            .spawn(move || {
                let mut next_tick = Instant::now() + period;
                while running_thread.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if next_tick > now {
                        thread::sleep(next_tick - now);
                    }
                    next_tick += period;

                    if !engine.is_capture_active() {
                        engine.run_decay_step();
                    }
                }
                debug!("Decay driver loop exited");
            })
            .map_err(|e| error!("Failed to spawn decay thread: {e}"))
            .ok();

        Self { running, thread }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && self.thread.is_some()
    }

    /// Stop the thread and wait for the in-flight step to finish
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            match handle.join() {
                Ok(()) => info!("Decay driver stopped"),
                Err(_) => warn!("Decay thread panicked"),
            }
        }
    }
}

impl Drop for DecayDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
