//! # Sensor Uplink Node
//!
//! Bootstrap for one acquisition node: a simulated sensor feeds the
//! pipeline, the uplink flushes to a TCP sink.
//!
//! Usage: `sensor_uplink [config.toml]` (defaults when no file is given).
//! Logging through `RUST_LOG`, e.g. `RUST_LOG=debug`.
//!
//! Any configuration or startup failure exits non-zero before a single
//! reading is sampled.

use std::{
    env,
    process::ExitCode,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use log::{error, info};

use sensor_uplink::{
    PipelineConfig, TcpTransport, Uplink, UplinkError, UplinkResult,
    component_a::sensor::Sensor,
};

fn main() -> ExitCode {
    env_logger::init();
    info!("=== SENSOR UPLINK START ===");

    match run() {
        Ok(()) => {
            info!("=== SENSOR UPLINK FINISHED ===");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> UplinkResult<()> {
    let config = match env::args().nth(1) {
        Some(path) => {
            info!("[Main] loading configuration from {}", path);
            PipelineConfig::load(path)?
        }
        None => {
            info!("[Main] no configuration file given; using defaults");
            PipelineConfig::default()
        }
    };
    config.validate()?;

    let transport = TcpTransport::from_config(&config.transport)?;
    info!("[Main] sink at {}", transport.addr());

    let uplink = Uplink::start(&config, transport)?;
    let running = Arc::new(AtomicBool::new(true));

    let sensor = Sensor::new(
        "Temperature",
        config.sensor.clone(),
        Arc::clone(uplink.pipeline()),
        Arc::clone(&running),
    );
    let sensor_handle = thread::Builder::new()
        .name("sensor".into())
        .spawn(move || sensor.run())
        .map_err(|e| UplinkError::Initialization(format!("sensor thread: {e}")))?;

    if config.sensor.run_secs == 0 {
        info!("[Main] running until killed");
        if sensor_handle.join().is_err() {
            error!("[Main] sensor thread panicked");
        }
    } else {
        info!("[Main] running for {} seconds...", config.sensor.run_secs);
        thread::sleep(Duration::from_secs(config.sensor.run_secs));
        running.store(false, Ordering::Release);
        if sensor_handle.join().is_err() {
            error!("[Main] sensor thread panicked");
        }
    }

    let snapshot = uplink.shutdown();
    info!(
        "[Main] {} wakes, {} readings sent, {} lost",
        snapshot.total_wakes(),
        snapshot.readings_sent,
        snapshot.readings_lost
    );
    match toml::to_string(&snapshot) {
        Ok(text) => info!("[Main] final counters:\n{}", text),
        Err(e) => info!("[Main] final counters: {:?} ({})", snapshot, e),
    }
    Ok(())
}
