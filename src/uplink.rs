//! Uplink runtime: wires a `Pipeline` to a transport and runs the
//! transmitter and periodic timer on their own threads.
//!
//! Startup is all-or-nothing: if the timer or the transmitter thread cannot
//! be created, `start` returns `UplinkError::Initialization` and whatever was
//! already running is torn down.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use log::{error, info};

use crate::{
    component_b::{
        scheduler::{PeriodicTimer, WakeReason},
        transmitter::Transmitter,
        transport::Transport,
    },
    config::PipelineConfig,
    error::{SubmitError, UplinkError, UplinkResult},
    pipeline::{Admission, Pipeline},
    reading::Reading,
    utils::stats::StatsSnapshot,
};

pub struct Uplink {
    pipeline: Arc<Pipeline>,
    timer: Option<PeriodicTimer>,
    transmitter: Option<JoinHandle<()>>,
}

impl Uplink {
    pub fn start<T>(config: &PipelineConfig, transport: T) -> UplinkResult<Self>
    where
        T: Transport + 'static,
    {
        let pipeline = Arc::new(Pipeline::new(config)?);
        let timer = PeriodicTimer::spawn(config.max_time(), Arc::clone(&pipeline))?;

        let transmitter =
            Transmitter::new(Arc::clone(&pipeline), transport).with_timer(timer.handle());
        let core = config.transmitter_core;

        let handle = thread::Builder::new()
            .name("uplink-transmitter".into())
            .spawn(move || {
                if let Some(core) = core {
                    pin_to_core(core);
                }
                transmitter.run();
            })
            .map_err(|e| {
                error!("[Uplink] failed to spawn transmitter: {}", e);
                UplinkError::Initialization(format!("transmitter thread: {e}"))
            })?;

        info!(
            "[Uplink] started capacity={} max_time={}ms buffer={}B",
            config.queue_capacity, config.max_time_ms, config.transmission_buffer_size
        );
        Ok(Self {
            pipeline,
            timer: Some(timer),
            transmitter: Some(handle),
        })
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn submit(&self, reading: Reading) -> Result<Admission, SubmitError> {
        self.pipeline.submit(reading)
    }

    /// Flushes what is queued (best effort), stops both threads and returns
    /// the final counters.
    pub fn shutdown(mut self) -> StatsSnapshot {
        self.stop();
        self.pipeline.stats().snapshot()
    }

    fn stop(&mut self) {
        if let Some(handle) = self.transmitter.take() {
            if self.pipeline.signal().request_shutdown() {
                self.pipeline.stats().record_wake(WakeReason::Shutdown);
            }
            if handle.join().is_err() {
                error!("[Uplink] transmitter thread panicked");
            }
        }
        if let Some(timer) = self.timer.take() {
            timer.stop();
        }
        info!("[Uplink] stopped.");
    }
}

impl Drop for Uplink {
    fn drop(&mut self) {
        if self.transmitter.is_some() {
            self.stop();
        }
    }
}

fn pin_to_core(core: usize) {
    let core_ids = core_affinity::get_core_ids().unwrap_or_default();
    match core_ids.get(core) {
        Some(core_id) => {
            if core_affinity::set_for_current(*core_id) {
                info!("[Uplink] transmitter pinned to core {}", core);
            } else {
                error!("[Uplink] failed to pin transmitter to core {}", core);
            }
        }
        None => error!("[Uplink] core {} not found among available cores", core),
    }
}
