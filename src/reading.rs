//! Sensor reading and its fixed-size wire record.
//!
//! Record layout, native byte order, no framing:
//! `device_id:i32 | measurement_type:i32 | value:f32 [| timestamp_us:u64]`

pub const RECORD_SIZE: usize = 12;
pub const TIMESTAMPED_RECORD_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub device_id: i32,
    pub measurement_type: i32,
    pub value: f32,
    /// Microseconds since the pipeline epoch; set on acceptance when enabled.
    pub timestamp_us: Option<u64>,
}

impl Reading {
    pub fn new(device_id: i32, measurement_type: i32, value: f32) -> Self {
        Self {
            device_id,
            measurement_type,
            value,
            timestamp_us: None,
        }
    }

    pub fn with_timestamp(self, timestamp_us: u64) -> Self {
        Self {
            timestamp_us: Some(timestamp_us),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Compact,
    Timestamped,
}

impl WireFormat {
    pub const fn record_size(self) -> usize {
        match self {
            WireFormat::Compact => RECORD_SIZE,
            WireFormat::Timestamped => TIMESTAMPED_RECORD_SIZE,
        }
    }

    /// Appends one record to `out`. A missing timestamp encodes as 0.
    pub fn encode(self, reading: &Reading, out: &mut Vec<u8>) {
        out.extend_from_slice(&reading.device_id.to_ne_bytes());
        out.extend_from_slice(&reading.measurement_type.to_ne_bytes());
        out.extend_from_slice(&reading.value.to_ne_bytes());
        if self == WireFormat::Timestamped {
            out.extend_from_slice(&reading.timestamp_us.unwrap_or(0).to_ne_bytes());
        }
    }

    /// Decodes one record; `None` if `bytes` is shorter than a record.
    pub fn decode(self, bytes: &[u8]) -> Option<Reading> {
        if bytes.len() < self.record_size() {
            return None;
        }
        let word = |at: usize| [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]];
        let mut reading = Reading::new(
            i32::from_ne_bytes(word(0)),
            i32::from_ne_bytes(word(4)),
            f32::from_ne_bytes(word(8)),
        );
        if self == WireFormat::Timestamped {
            let mut stamp = [0u8; 8];
            stamp.copy_from_slice(&bytes[12..20]);
            reading.timestamp_us = Some(u64::from_ne_bytes(stamp));
        }
        Some(reading)
    }

    /// Decodes every whole record in `bytes`; a trailing partial record is ignored.
    pub fn decode_all(self, bytes: &[u8]) -> Vec<Reading> {
        bytes
            .chunks_exact(self.record_size())
            .filter_map(|chunk| self.decode(chunk))
            .collect()
    }
}
