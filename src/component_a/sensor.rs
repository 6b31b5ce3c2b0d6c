//! sensor.rs
//! Simulated sensor feeding the pipeline with periodic releases.
//! - SpinSleeper keeps the sampling period steady
//! - noise around a base value, plus occasional spikes so both the elevated
//!   and the critical paths get traffic

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use log::{debug, info};
use rand::{random_bool, random_range};
use spin_sleep::{SpinSleeper, SpinStrategy};

use crate::{
    config::SensorConfig,
    pipeline::{Admission, Pipeline},
    reading::Reading,
};

pub struct Sensor {
    pub name: String,
    pub config: SensorConfig,
    pub pipeline: Arc<Pipeline>,
    pub running: Arc<AtomicBool>,
}

impl Sensor {
    pub fn new(
        name: &str,
        config: SensorConfig,
        pipeline: Arc<Pipeline>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            name: name.to_string(),
            config,
            pipeline,
            running,
        }
    }

    /// One simulated sample.
    pub fn sample(&self) -> f32 {
        let mut value = self.config.base_value;
        if self.config.noise > 0.0 {
            value += random_range(-self.config.noise..self.config.noise);
        }
        if self.config.spike_probability > 0.0 && random_bool(self.config.spike_probability) {
            if random_bool(0.5) {
                value += self.config.spike_magnitude;
            } else {
                value -= self.config.spike_magnitude;
            }
        }
        value
    }

    /// Periodic release loop; returns once `running` is cleared.
    pub fn run(&self) {
        let period = Duration::from_millis(self.config.sample_interval_ms);
        let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
        let mut next_release = Instant::now() + period;
        let mut seq: u64 = 1;

        info!("[{}] sampling every {:?}", self.name, period);

        while self.running.load(Ordering::Acquire) {
            let now = Instant::now();
            if now < next_release {
                sleeper.sleep(next_release - now);
            } else {
                debug!("[{}] release {} late by {:?}", self.name, seq, now - next_release);
            }

            let reading = Reading::new(
                self.config.device_id,
                self.config.measurement_type,
                self.sample(),
            );

            match self.pipeline.submit(reading) {
                Ok(Admission::Filtered) => {}
                Ok(Admission::Queued { classification, woke }) => {
                    debug!(
                        "[{}] seq={} value={:.2} {:?} woke={:?}",
                        self.name, seq, reading.value, classification, woke
                    );
                }
                // Already logged and counted by the pipeline.
                Err(_) => {}
            }

            next_release += period;
            seq += 1;
        }

        debug!("[{}] stopped.", self.name);
    }
}
