//! VFD Visualizer - system audio as a bar-graph spectrum with falling peaks.
//!
//! Captures live input (or replays a WAV file), runs it through the spectrum
//! engine and draws the bars in the terminal.

use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use std::error::Error;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use vfd_visualizer::audio::capture::list_input_devices;
use vfd_visualizer::audio::{CaptureSession, DecayDriver, SpectrumEngine, WavReplay};
use vfd_visualizer::cli::Args;
use vfd_visualizer::meter::MeterStyle;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    run(Args::parse()).inspect_err(|e| error!("{e}"))
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    if args.list_devices {
        for name in list_input_devices()? {
            println!("{name}");
        }
        return Ok(());
    }

    let engine = Arc::new(SpectrumEngine::configure(args.engine_config())?);
    apply_params(&engine, &args);

    let mut decay = DecayDriver::spawn(Arc::clone(&engine), args.frame_rate());
    let style = args.meter_style();
    let frame = args.frame_period();
    let limit = args.run_limit();

    match &args.input {
        Some(path) => {
            let cancel = Arc::new(AtomicBool::new(false));
            let replay = {
                let engine = Arc::clone(&engine);
                let cancel = Arc::clone(&cancel);
                let path = path.clone();
                thread::spawn(move || WavReplay::default().play_file(&engine, path, &cancel))
            };

            let started = Instant::now();
            let drawn = draw_while(&engine, &style, frame, || {
                let expired = limit.is_some_and(|l| started.elapsed() >= l);
                !replay.is_finished() && !expired
            });
            cancel.store(true, Ordering::Relaxed);

            match replay.join() {
                Ok(Ok(summary)) => info!(
                    "Replayed {} blocks ({:.2}s)",
                    summary.blocks, summary.duration_secs
                ),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => warn!("Replay thread panicked"),
            }
            drawn?;
        }
        None => {
            let mut session = CaptureSession::start(Arc::clone(&engine), args.device.as_deref())?;
            info!("Capturing from {}", session.device_name());

            let started = Instant::now();
            let drawn = draw_while(&engine, &style, frame, || {
                limit.map_or(true, |l| started.elapsed() < l)
            });
            session.stop();
            drawn?;
        }
    }

    // Let the decay driver bring everything to rest
    let tail = args.tail_duration();
    let stopped = Instant::now();
    draw_while(&engine, &style, frame, || stopped.elapsed() < tail)?;

    decay.stop();
    Ok(())
}

fn apply_params(engine: &SpectrumEngine, args: &Args) {
    engine.set_gain(args.gain);
    engine.set_smoothing(args.smoothing);
    engine.set_gravity(args.gravity);
    engine.set_hold_time(args.hold);

    let bars = engine.set_num_bars(args.bars);
    if bars != args.bars {
        warn!("Unsupported bar count {}, using {}", args.bars, bars);
    }

    let p = engine.params().snapshot();
    info!(
        "Params: gain {:.1}, smoothing {:.2}, gravity {:.3}, hold {} frames, {} bars",
        p.gain, p.smoothing, p.gravity, p.hold_frames, p.num_bars
    );
}

/// Redraw the meter once per `frame` while `keep_going` holds. Stops at the
/// first failed write to stdout.
fn draw_while(
    engine: &SpectrumEngine,
    style: &MeterStyle,
    frame: Duration,
    mut keep_going: impl FnMut() -> bool,
) -> io::Result<()> {
    let mut bands = Vec::new();
    let mut peaks = Vec::new();
    let stdout = io::stdout();

    while keep_going() {
        let bars = engine.num_bars();
        bands.resize(bars, 0.0);
        peaks.resize(bars, 0.0);
        engine.snapshot_band_magnitudes().copy_to(&mut bands);
        engine.snapshot_peak_levels().copy_to(&mut peaks);

        style.draw_frame(
            &mut stdout.lock(),
            &bands,
            &peaks,
            &engine.frequency_ticks(),
        )?;

        thread::sleep(frame);
    }
    Ok(())
}
