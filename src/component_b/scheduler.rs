//! scheduler.rs
//! Transmitter activation.
//!
//! `WakeSignal` replaces task suspend/resume: the transmitter blocks on a
//! condition variable while `Parked`, and any trigger flips it to `Running`.
//! Waking an already-running transmitter is a no-op, so concurrent triggers
//! collapse into a single transition.
//!
//! `PeriodicTimer` is the timeout trigger: a thread waiting on a command
//! channel with a deadline. A fire wakes the transmitter only if readings are
//! queued; the transmitter pushes the deadline back after every cycle.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use log::{debug, error, info};
use parking_lot::{Condvar, Mutex};

use crate::{
    error::{UplinkError, UplinkResult},
    pipeline::Pipeline,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Parked,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WakeReason {
    QueueFull,
    Critical,
    Timer,
    Shutdown,
}

#[derive(Debug)]
struct SignalState {
    lifecycle: Lifecycle,
    reason: Option<WakeReason>,
    shutdown: bool,
    transitions: u64,
}

#[derive(Debug)]
pub struct WakeSignal {
    state: Mutex<SignalState>,
    cv: Condvar,
}

impl Default for WakeSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeSignal {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SignalState {
                lifecycle: Lifecycle::Parked,
                reason: None,
                shutdown: false,
                transitions: 0,
            }),
            cv: Condvar::new(),
        }
    }

    /// Moves `Parked -> Running`. Returns false if already running.
    pub fn wake(&self, reason: WakeReason) -> bool {
        let mut state = self.state.lock();
        if state.lifecycle == Lifecycle::Running {
            return false;
        }
        state.lifecycle = Lifecycle::Running;
        state.reason = Some(reason);
        state.transitions += 1;
        self.cv.notify_one();
        true
    }

    /// Blocks while parked; returns what woke the transmitter.
    pub fn wait_for_wake(&self) -> WakeReason {
        let mut state = self.state.lock();
        while state.lifecycle == Lifecycle::Parked {
            self.cv.wait(&mut state);
        }
        state.reason.unwrap_or(WakeReason::Shutdown)
    }

    /// Parks only if `idle()` holds; evaluated under the signal lock so a
    /// producer cannot slip a reading in between the check and the park.
    pub fn park_if(&self, idle: impl FnOnce() -> bool) -> bool {
        let mut state = self.state.lock();
        if !idle() {
            return false;
        }
        state.lifecycle = Lifecycle::Parked;
        state.reason = None;
        true
    }

    /// Parks unconditionally, after a failed cycle.
    pub fn park(&self) {
        let mut state = self.state.lock();
        state.lifecycle = Lifecycle::Parked;
        state.reason = None;
    }

    /// Marks shutdown and wakes the transmitter for its last cycle.
    /// Returns whether the transmitter was parked.
    pub fn request_shutdown(&self) -> bool {
        let mut state = self.state.lock();
        state.shutdown = true;
        if state.lifecycle == Lifecycle::Running {
            return false;
        }
        state.lifecycle = Lifecycle::Running;
        state.reason = Some(WakeReason::Shutdown);
        state.transitions += 1;
        self.cv.notify_one();
        true
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().shutdown
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lock().lifecycle
    }

    /// Number of `Parked -> Running` transitions so far.
    pub fn transitions(&self) -> u64 {
        self.state.lock().transitions
    }
}

#[derive(Debug)]
enum TimerCommand {
    Reset,
    Stop,
}

/// Restarts the periodic timer's interval from now.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    tx: Sender<TimerCommand>,
}

impl TimerHandle {
    pub fn reset(&self) {
        // A full channel already holds a pending reset.
        let _ = self.tx.try_send(TimerCommand::Reset);
    }
}

pub struct PeriodicTimer {
    tx: Sender<TimerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTimer {
    pub fn spawn(interval: Duration, pipeline: Arc<Pipeline>) -> UplinkResult<Self> {
        let (tx, rx) = bounded::<TimerCommand>(8);

        let handle = thread::Builder::new()
            .name("uplink-timer".into())
            .spawn(move || {
                let mut deadline = Instant::now() + interval;
                loop {
                    match rx.recv_deadline(deadline) {
                        Ok(TimerCommand::Reset) => {
                            deadline = Instant::now() + interval;
                        }
                        Ok(TimerCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {
                            if pipeline.queue().is_empty() {
                                debug!("[Timer] timeout with empty queue; nothing to send");
                            } else {
                                debug!("[Timer] timeout; enabling transmission");
                                pipeline.request_wake(WakeReason::Timer);
                            }
                            deadline = Instant::now() + interval;
                        }
                    }
                }
                debug!("[Timer] stopped.");
            })
            .map_err(|e| {
                error!("[Timer] failed to spawn timer thread: {}", e);
                UplinkError::Initialization(format!("timer thread: {e}"))
            })?;

        info!("[Timer] started, interval={:?}", interval);
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    pub fn handle(&self) -> TimerHandle {
        TimerHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn stop(mut self) {
        self.stop_inner();
    }

    fn stop_inner(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.tx.send(TimerCommand::Stop);
            if handle.join().is_err() {
                error!("[Timer] timer thread panicked");
            }
        }
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.stop_inner();
    }
}
