//! Pipeline context: the one owner of all shared uplink state.
//!
//! Producer path (`submit`): validate → classify → enqueue → maybe wake.
//! Lock order is reference, then queue; the wake signal is only taken after
//! both are released, so the transmitter (signal, then queue) cannot deadlock
//! against a producer.

use std::time::Instant;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::{
    component_a::{
        filter::{Classification, ThresholdFilter},
        queue::BoundedQueue,
    },
    component_b::scheduler::{WakeReason, WakeSignal},
    config::PipelineConfig,
    error::{SubmitError, UplinkResult},
    reading::{Reading, WireFormat},
    utils::stats::UplinkStats,
};

/// What happened to a submitted reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Too close to the reference to be worth recording.
    Filtered,
    Queued {
        /// `None` when the threshold filter is disabled.
        classification: Option<Classification>,
        /// Set when this reading moved the transmitter out of `Parked`.
        woke: Option<WakeReason>,
    },
}

impl Admission {
    pub fn is_queued(&self) -> bool {
        matches!(self, Admission::Queued { .. })
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    filter: Mutex<ThresholdFilter>,
    queue: BoundedQueue,
    signal: WakeSignal,
    stats: UplinkStats,
    epoch: Instant,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> UplinkResult<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            filter: Mutex::new(ThresholdFilter::new(config.tolerance())),
            queue: BoundedQueue::new(config.queue_capacity),
            signal: WakeSignal::new(),
            stats: UplinkStats::new(),
            epoch: Instant::now(),
        })
    }

    /// Offers one reading from the producer.
    ///
    /// A rejected push is returned as `SubmitError::QueueFull`; the reading is
    /// gone but the transmitter is still woken so the queue drains.
    pub fn submit(&self, reading: Reading) -> Result<Admission, SubmitError> {
        self.stats.record_submitted();

        if !reading.value.is_finite() {
            self.stats.record_rejected_invalid();
            warn!(
                "[Pipeline] device {} produced non-finite value {}; ignored",
                reading.device_id, reading.value
            );
            return Err(SubmitError::NonFiniteValue {
                value: reading.value,
                device_id: reading.device_id,
            });
        }

        let reading = if self.config.enable_timestamp {
            reading.with_timestamp(self.now_us())
        } else {
            reading
        };

        let (classification, admitted) = {
            let mut filter = self.filter.lock();
            let classification = self
                .config
                .enable_threshold_filter
                .then(|| filter.evaluate(reading.value));

            if classification.is_some_and(|c| !c.is_novel()) {
                self.stats.record_filtered();
                debug!(
                    "[Pipeline] {} within tolerance of {}; filtered",
                    reading.value,
                    filter.reference()
                );
                return Ok(Admission::Filtered);
            }

            let admitted = self.queue.try_push(reading);
            if admitted && classification.is_some() {
                filter.accept(reading.value);
            }
            (classification, admitted)
        };

        let critical =
            self.config.enable_critical_wake && classification == Some(Classification::Critical);
        let reason = if critical {
            Some(WakeReason::Critical)
        } else if self.queue.is_full() {
            Some(WakeReason::QueueFull)
        } else {
            None
        };
        let woke = reason.filter(|&r| self.request_wake(r));

        if !admitted {
            self.stats.record_dropped_full();
            let err = SubmitError::QueueFull {
                capacity: self.queue.capacity(),
                device_id: reading.device_id,
            };
            warn!("[Pipeline] {}", err);
            return Err(err);
        }

        self.stats.record_queued();
        debug!(
            "[Pipeline] queued {} ({:?}), len={}",
            reading.value,
            classification,
            self.queue.len()
        );
        Ok(Admission::Queued {
            classification,
            woke,
        })
    }

    /// Wakes the transmitter; true only for an actual `Parked -> Running`.
    pub fn request_wake(&self, reason: WakeReason) -> bool {
        if !self.signal.wake(reason) {
            return false;
        }
        self.stats.record_wake(reason);
        match reason {
            WakeReason::QueueFull => debug!("[Pipeline] queue is full; waking transmitter"),
            WakeReason::Critical => debug!("[Pipeline] critical reading; waking transmitter"),
            WakeReason::Timer => debug!("[Pipeline] timer timeout; waking transmitter"),
            WakeReason::Shutdown => debug!("[Pipeline] shutdown; waking transmitter"),
        }
        true
    }

    pub fn reference(&self) -> f32 {
        self.filter.lock().reference()
    }

    /// Starts filtering against `reference` instead of accepting the next reading unconditionally.
    /// A non-finite seed is refused and the current reference kept.
    pub fn seed_reference(&self, reference: f32) -> Result<(), SubmitError> {
        self.filter.lock().set_reference(reference).inspect_err(|e| {
            warn!("[Pipeline] {}", e);
        })
    }

    pub fn reset_reference(&self) {
        self.filter.lock().reset();
    }

    pub fn queue(&self) -> &BoundedQueue {
        &self.queue
    }

    pub fn signal(&self) -> &WakeSignal {
        &self.signal
    }

    pub fn stats(&self) -> &UplinkStats {
        &self.stats
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn wire_format(&self) -> WireFormat {
        self.config.wire_format()
    }

    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }
}
