//! transmitter.rs
//! Long-lived uplink task. Parked until woken, then one flush cycle:
//! - drain the queue in whole batches into the transmission buffer
//! - send the buffer whenever the next record would not fit, then at the end
//! - push the periodic timer back and park once the queue is empty
//!
//! Delivery is at-most-once: readings drained into a cycle whose send fails
//! are counted as lost, never re-queued.

use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::{
    component_b::{
        scheduler::{TimerHandle, WakeReason},
        transport::{Connection, Transport},
    },
    error::TransportError,
    pipeline::Pipeline,
    reading::{Reading, WireFormat},
};

/// Fixed-capacity send buffer, owned by the transmitter.
#[derive(Debug)]
pub struct TransmitBuffer {
    bytes: Vec<u8>,
    capacity: usize,
    records: usize,
}

impl TransmitBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
            records: 0,
        }
    }

    pub fn fits(&self, record_size: usize) -> bool {
        self.bytes.len() + record_size <= self.capacity
    }

    /// Appends one record; false (buffer untouched) if it would not fit.
    pub fn push(&mut self, reading: &Reading, format: WireFormat) -> bool {
        if !self.fits(format.record_size()) {
            return false;
        }
        format.encode(reading, &mut self.bytes);
        self.records += 1;
        true
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.records = 0;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub readings: usize,
    pub flushes: usize,
    pub bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Woken with nothing queued; the transport was not touched.
    Spurious,
    Flushed(CycleReport),
}

pub struct Transmitter<T: Transport> {
    pipeline: Arc<Pipeline>,
    transport: T,
    buffer: TransmitBuffer,
    format: WireFormat,
    timer: Option<TimerHandle>,
}

impl<T: Transport> Transmitter<T> {
    pub fn new(pipeline: Arc<Pipeline>, transport: T) -> Self {
        let buffer = TransmitBuffer::new(pipeline.config().transmission_buffer_size);
        let format = pipeline.wire_format();
        Self {
            pipeline,
            transport,
            buffer,
            format,
            timer: None,
        }
    }

    pub fn with_timer(mut self, timer: TimerHandle) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Task body. Returns after the cycle that follows a shutdown request.
    pub fn run(mut self) {
        info!(
            "[Transmitter] started buffer={}B record={}B",
            self.buffer.capacity(),
            self.format.record_size()
        );
        let signal_owner = Arc::clone(&self.pipeline);
        let signal = signal_owner.signal();

        loop {
            let reason = signal.wait_for_wake();
            debug!("[Transmitter] running, woken by {:?}", reason);

            if reason == WakeReason::Shutdown && self.pipeline.queue().is_empty() {
                break;
            }

            loop {
                let result = self.run_cycle();
                if let Some(timer) = &self.timer {
                    timer.reset();
                }
                match result {
                    Ok(_) => {
                        let queue = self.pipeline.queue();
                        if signal.park_if(|| queue.is_empty()) {
                            break;
                        }
                        debug!("[Transmitter] readings arrived during flush; another cycle");
                    }
                    Err(e) => {
                        error!("[Transmitter] cycle aborted: {}", e);
                        signal.park();
                        break;
                    }
                }
            }

            if signal.is_shutdown() {
                break;
            }
        }

        // Readings that raced the last park or the shutdown check.
        if !self.pipeline.queue().is_empty() {
            if let Err(e) = self.run_cycle() {
                error!("[Transmitter] final flush failed: {}", e);
            }
        }
        info!("[Transmitter] stopped.");
    }

    /// One activation: connect, drain until empty, flush, report.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, TransportError> {
        let stats = self.pipeline.stats();
        stats.record_cycle();

        if self.pipeline.queue().is_empty() {
            stats.record_spurious_wake();
            debug!("[Transmitter] woken with empty queue; parking");
            return Ok(CycleOutcome::Spurious);
        }

        let mut conn = match self.transport.connect() {
            Ok(conn) => conn,
            Err(e) => {
                stats.record_transport_error();
                return Err(e);
            }
        };

        let mut report = CycleReport::default();
        let record_size = self.format.record_size();

        loop {
            let batch = self.pipeline.queue().drain_all();
            if batch.is_empty() {
                break;
            }
            debug!("[Transmitter] drained {} readings", batch.len());

            for (i, reading) in batch.iter().enumerate() {
                if !self.buffer.fits(record_size) {
                    if let Err(e) = self.flush(&mut conn, &mut report) {
                        self.abandon(batch.len() - i);
                        return Err(e);
                    }
                }
                let pushed = self.buffer.push(reading, self.format);
                debug_assert!(pushed, "validated buffer must hold one record after a flush");
            }
        }

        if !self.buffer.is_empty() {
            if let Err(e) = self.flush(&mut conn, &mut report) {
                self.abandon(0);
                return Err(e);
            }
        }

        debug!(
            "[Transmitter] cycle done: readings={} flushes={} bytes={}",
            report.readings, report.flushes, report.bytes
        );
        Ok(CycleOutcome::Flushed(report))
    }

    fn flush(&mut self, conn: &mut T::Connection, report: &mut CycleReport) -> Result<(), TransportError> {
        let bytes = self.buffer.len();
        let records = self.buffer.records();
        conn.send(self.buffer.as_slice())?;
        self.pipeline.stats().record_flush(bytes, records);
        report.flushes += 1;
        report.bytes += bytes;
        report.readings += records;
        self.buffer.clear();
        Ok(())
    }

    /// Drops the buffered records plus `undrained` readings of the current batch.
    fn abandon(&mut self, undrained: usize) {
        let lost = self.buffer.records() + undrained;
        let stats = self.pipeline.stats();
        stats.record_transport_error();
        stats.record_lost(lost);
        warn!("[Transmitter] send failed; {} drained readings lost", lost);
        self.buffer.clear();
    }
}
