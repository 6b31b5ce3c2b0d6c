//! Runtime configuration for the uplink.
//!
//! Defaults reproduce the firmware build constants: queue length 5, 30 s
//! flush timeout, 1500-byte transmission buffer, 5 % / 15 % tolerance bands.
//! Every field is optional in TOML; missing keys fall back to the default.

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    component_a::filter::Tolerance,
    error::{UplinkError, UplinkResult},
    reading::WireFormat,
};

pub const DEFAULT_QUEUE_CAPACITY: usize = 5;
pub const DEFAULT_MAX_TIME_MS: u64 = 30_000;
pub const DEFAULT_TRANSMISSION_BUFFER_SIZE: usize = 1500;
pub const DEFAULT_TOLERANCE_NORMAL_PCT: f32 = 5.0;
pub const DEFAULT_TOLERANCE_CRITICAL_PCT: f32 = 15.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Readings held before a queue-full wake.
    pub queue_capacity: usize,
    /// Periodic flush interval in milliseconds.
    pub max_time_ms: u64,
    /// Bytes per transport send.
    pub transmission_buffer_size: usize,
    /// When false every reading is queued and nothing is ever critical.
    pub enable_threshold_filter: bool,
    /// When false a critical reading is queued but does not wake the transmitter.
    pub enable_critical_wake: bool,
    /// Stamp accepted readings and append the stamp to each wire record.
    pub enable_timestamp: bool,
    pub tolerance_normal_pct: f32,
    pub tolerance_critical_pct: f32,
    /// Pin the transmitter thread to this core, if present.
    pub transmitter_core: Option<usize>,
    pub transport: TransportConfig,
    pub sensor: SensorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_time_ms: DEFAULT_MAX_TIME_MS,
            transmission_buffer_size: DEFAULT_TRANSMISSION_BUFFER_SIZE,
            enable_threshold_filter: true,
            enable_critical_wake: true,
            enable_timestamp: false,
            tolerance_normal_pct: DEFAULT_TOLERANCE_NORMAL_PCT,
            tolerance_critical_pct: DEFAULT_TOLERANCE_CRITICAL_PCT,
            transmitter_core: None,
            transport: TransportConfig::default(),
            sensor: SensorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// `host:port` of the sink.
    pub address: String,
    pub connect_timeout_ms: u64,
    pub send_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:1010".to_string(),
            connect_timeout_ms: 4_000,
            send_timeout_ms: 4_000,
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Simulated producer used by the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub device_id: i32,
    pub measurement_type: i32,
    pub sample_interval_ms: u64,
    pub base_value: f32,
    /// Uniform noise half-width around `base_value`.
    pub noise: f32,
    /// Chance per sample of an excursion of `spike_magnitude`.
    pub spike_probability: f64,
    pub spike_magnitude: f32,
    /// Run time of the binary; 0 runs until the process is killed.
    pub run_secs: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            device_id: 1,
            measurement_type: 1,
            sample_interval_ms: 1_000,
            base_value: 27.0,
            noise: 0.5,
            spike_probability: 0.05,
            spike_magnitude: 8.0,
            run_secs: 60,
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> UplinkResult<Self> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> UplinkResult<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> UplinkResult<()> {
        if self.queue_capacity == 0 {
            return Err(UplinkError::Config("queue_capacity must be at least 1".into()));
        }
        if self.max_time_ms == 0 {
            return Err(UplinkError::Config("max_time_ms must be positive".into()));
        }
        for (name, pct) in [
            ("tolerance_normal_pct", self.tolerance_normal_pct),
            ("tolerance_critical_pct", self.tolerance_critical_pct),
        ] {
            if !pct.is_finite() || pct < 0.0 {
                return Err(UplinkError::Config(format!(
                    "{name} must be finite and non-negative, got {pct}"
                )));
            }
        }
        if self.tolerance_critical_pct <= self.tolerance_normal_pct {
            return Err(UplinkError::Config(format!(
                "tolerance_critical_pct ({}) must exceed tolerance_normal_pct ({})",
                self.tolerance_critical_pct, self.tolerance_normal_pct
            )));
        }
        let record = self.wire_format().record_size();
        if self.transmission_buffer_size < record {
            return Err(UplinkError::Config(format!(
                "transmission_buffer_size ({}) cannot hold one {record}-byte record",
                self.transmission_buffer_size
            )));
        }
        if self.transport.connect_timeout_ms == 0 || self.transport.send_timeout_ms == 0 {
            return Err(UplinkError::Config(
                "transport timeouts must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.sensor.spike_probability) {
            return Err(UplinkError::Config(format!(
                "sensor.spike_probability must be within [0, 1], got {}",
                self.sensor.spike_probability
            )));
        }
        if !self.sensor.noise.is_finite() || self.sensor.noise < 0.0 {
            return Err(UplinkError::Config("sensor.noise must be finite and non-negative".into()));
        }
        Ok(())
    }

    pub fn max_time(&self) -> Duration {
        Duration::from_millis(self.max_time_ms)
    }

    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.tolerance_normal_pct, self.tolerance_critical_pct)
    }

    pub fn wire_format(&self) -> WireFormat {
        if self.enable_timestamp {
            WireFormat::Timestamped
        } else {
            WireFormat::Compact
        }
    }
}
