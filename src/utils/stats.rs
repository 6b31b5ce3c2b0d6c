//! Lock-free uplink counters.
//!
//! Producers, the timer and the transmitter all bump these without taking a
//! lock (`Ordering::Relaxed` fetch_add); `snapshot()` is for reporting only
//! and makes no cross-counter consistency guarantee.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::component_b::scheduler::WakeReason;

#[derive(Debug, Default)]
pub struct UplinkStats {
    submitted: AtomicU64,
    filtered: AtomicU64,
    queued: AtomicU64,
    dropped_full: AtomicU64,
    rejected_invalid: AtomicU64,

    wake_queue_full: AtomicU64,
    wake_critical: AtomicU64,
    wake_timer: AtomicU64,
    wake_shutdown: AtomicU64,

    cycles: AtomicU64,
    spurious_wakes: AtomicU64,
    flushes: AtomicU64,
    bytes_sent: AtomicU64,
    readings_sent: AtomicU64,
    transport_errors: AtomicU64,
    readings_lost: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub filtered: u64,
    pub queued: u64,
    pub dropped_full: u64,
    pub rejected_invalid: u64,
    pub wake_queue_full: u64,
    pub wake_critical: u64,
    pub wake_timer: u64,
    pub wake_shutdown: u64,
    pub cycles: u64,
    pub spurious_wakes: u64,
    pub flushes: u64,
    pub bytes_sent: u64,
    pub readings_sent: u64,
    pub transport_errors: u64,
    pub readings_lost: u64,
}

impl StatsSnapshot {
    pub fn total_wakes(&self) -> u64 {
        self.wake_queue_full + self.wake_critical + self.wake_timer + self.wake_shutdown
    }
}

#[inline]
fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl UplinkStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        bump(&self.submitted, 1);
    }

    pub fn record_filtered(&self) {
        bump(&self.filtered, 1);
    }

    pub fn record_queued(&self) {
        bump(&self.queued, 1);
    }

    pub fn record_dropped_full(&self) {
        bump(&self.dropped_full, 1);
    }

    pub fn record_rejected_invalid(&self) {
        bump(&self.rejected_invalid, 1);
    }

    /// Counts a wake that actually moved the transmitter out of `Parked`.
    pub fn record_wake(&self, reason: WakeReason) {
        let counter = match reason {
            WakeReason::QueueFull => &self.wake_queue_full,
            WakeReason::Critical => &self.wake_critical,
            WakeReason::Timer => &self.wake_timer,
            WakeReason::Shutdown => &self.wake_shutdown,
        };
        bump(counter, 1);
    }

    pub fn record_cycle(&self) {
        bump(&self.cycles, 1);
    }

    pub fn record_spurious_wake(&self) {
        bump(&self.spurious_wakes, 1);
    }

    pub fn record_flush(&self, bytes: usize, readings: usize) {
        bump(&self.flushes, 1);
        bump(&self.bytes_sent, bytes as u64);
        bump(&self.readings_sent, readings as u64);
    }

    pub fn record_transport_error(&self) {
        bump(&self.transport_errors, 1);
    }

    pub fn record_lost(&self, readings: usize) {
        bump(&self.readings_lost, readings as u64);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            submitted: load(&self.submitted),
            filtered: load(&self.filtered),
            queued: load(&self.queued),
            dropped_full: load(&self.dropped_full),
            rejected_invalid: load(&self.rejected_invalid),
            wake_queue_full: load(&self.wake_queue_full),
            wake_critical: load(&self.wake_critical),
            wake_timer: load(&self.wake_timer),
            wake_shutdown: load(&self.wake_shutdown),
            cycles: load(&self.cycles),
            spurious_wakes: load(&self.spurious_wakes),
            flushes: load(&self.flushes),
            bytes_sent: load(&self.bytes_sent),
            readings_sent: load(&self.readings_sent),
            transport_errors: load(&self.transport_errors),
            readings_lost: load(&self.readings_lost),
        }
    }
}
