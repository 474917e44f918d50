//! Background pacing clock
//!
//! A dedicated thread emits ticks at a fixed interval so the render cadence is
//! not affected by load on the async runtime. The thread only produces
//! signals: it never touches the surface or any other shared render state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, trace};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::assets::TICK_CHANNEL_CAPACITY;
use crate::pipeline::health::RecorderHealth;

/// Control messages understood by the pacing thread
#[derive(Debug)]
pub enum PacingMessage {
    /// Begin ticking into the given channel, replacing any previous one
    Start(mpsc::Sender<Tick>),
    /// Stop ticking and drop the tick channel
    End,
    /// Terminate the thread
    Shutdown,
}

/// Clock state values for atomic access.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Stopped = 0,
    Running = 1,
}

impl ClockState {
    #[inline]
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ClockState::Running,
            _ => ClockState::Stopped,
        }
    }
}

/// One pacing signal
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    /// Sequence number within the current run, starting at 0
    pub seq: u64,
    pub at: Instant,
}

/// Fixed-interval tick source running on its own thread
///
/// Each `start` hands out a fresh bounded receiver. When the receiver lags
/// the tick is dropped rather than queued. `end` drops the sender, so the
/// receiver yields `None` once drained.
pub struct PacingClock {
    interval: Duration,
    control: std_mpsc::Sender<PacingMessage>,
    state: Arc<AtomicU8>,
    handle: Option<JoinHandle<()>>,
}

impl PacingClock {
    pub fn new(interval: Duration, health: Arc<RecorderHealth>) -> Self {
        let (control, control_rx) = std_mpsc::channel();
        let state = Arc::new(AtomicU8::new(ClockState::Stopped as u8));

        let thread_state = Arc::clone(&state);
        let handle = thread::spawn(move || run(control_rx, interval, thread_state, health));

        Self {
            interval,
            control,
            state,
            handle: Some(handle),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> ClockState {
        ClockState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Start ticking and return the receiving end of the tick channel
    pub fn start(&self) -> mpsc::Receiver<Tick> {
        let (tx, rx) = mpsc::channel(TICK_CHANNEL_CAPACITY);
        if self.control.send(PacingMessage::Start(tx)).is_err() {
            error!("Pacing thread is gone, no ticks will be delivered");
            return rx;
        }
        self.state
            .store(ClockState::Running as u8, Ordering::Release);
        rx
    }

    /// Stop ticking. Safe to call while already stopped.
    pub fn end(&self) {
        let _ = self.control.send(PacingMessage::End);
        self.state
            .store(ClockState::Stopped as u8, Ordering::Release);
    }
}

impl Drop for PacingClock {
    fn drop(&mut self) {
        let _ = self.control.send(PacingMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for PacingClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacingClock")
            .field("interval", &self.interval)
            .field("state", &self.state())
            .finish()
    }
}

fn run(
    control: std_mpsc::Receiver<PacingMessage>,
    interval: Duration,
    state: Arc<AtomicU8>,
    health: Arc<RecorderHealth>,
) {
    let mut sink: Option<mpsc::Sender<Tick>> = None;
    let mut seq = 0u64;
    let mut deadline = Instant::now() + interval;

    loop {
        let message = if sink.is_some() {
            control.recv_timeout(deadline.saturating_duration_since(Instant::now()))
        } else {
            control.recv().map_err(|_| RecvTimeoutError::Disconnected)
        };

        match message {
            Ok(PacingMessage::Start(tx)) => {
                sink = Some(tx);
                seq = 0;
                deadline = Instant::now() + interval;
                state.store(ClockState::Running as u8, Ordering::Release);
                debug!("PacingClock: running every {:?}", interval);
            }
            Ok(PacingMessage::End) => {
                if sink.take().is_some() {
                    debug!("PacingClock: stopped after {} ticks", seq);
                }
                state.store(ClockState::Stopped as u8, Ordering::Release);
            }
            Ok(PacingMessage::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                let now = Instant::now();
                let outcome = match &sink {
                    Some(tx) => tx.try_send(Tick { seq, at: now }),
                    None => Ok(()),
                };
                match outcome {
                    Ok(()) => {
                        seq += 1;
                        health.record_tick();
                    }
                    Err(TrySendError::Full(_)) => {
                        trace!("PacingClock: consumer lagging, tick {} dropped", seq);
                        health.record_tick_drop();
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!("PacingClock: tick consumer closed");
                        sink = None;
                        state.store(ClockState::Stopped as u8, Ordering::Release);
                    }
                }

                deadline += interval;
                if deadline <= now {
                    deadline = now + interval;
                }
            }
        }
    }

    state.store(ClockState::Stopped as u8, Ordering::Release);
}
