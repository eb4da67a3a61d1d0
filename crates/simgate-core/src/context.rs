//! The single-threaded execution context.
//!
//! Exactly one OS thread owns the [`SimulationState`]. It runs the periodic
//! simulation tick and, between ticks, drains a task queue of closures posted
//! by HTTP handlers and bridge workers. Callers never lock the state; they
//! hand a closure to [`ContextHandle::submit`] and wait on a per-request
//! completion signal (a [`tokio::sync::oneshot`] channel).
//!
//! # Timeouts
//!
//! A timeout bounds only the *waiting* caller. The posted task is not
//! cancelled: if the context is backlogged, the closure still runs after
//! the caller has given up, and its result is dropped.
//!
//! # Panics in tasks
//!
//! A task that panics is contained with [`std::panic::catch_unwind`] and
//! reported to its caller as [`ContextError::Panicked`]; the context thread
//! keeps running.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::state::SimulationState;

/// A unit of work executed on the context thread.
type Job = Box<dyn FnOnce(&mut SimulationState) + Send + 'static>;

/// Hook invoked on the context thread after every tick.
pub type TickHook = Box<dyn FnMut(&mut SimulationState) + Send + 'static>;

enum Message {
    Run(Job),
    Shutdown,
}

/// Errors surfaced to callers of [`ContextHandle::submit`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// The caller stopped waiting before the task completed.
    #[error("execution handoff timed out after {after_ms}ms")]
    Timeout {
        /// How long the caller waited.
        after_ms: u64,
    },

    /// The context thread is gone (shut down or crashed).
    #[error("execution context is not running")]
    Closed,

    /// The task panicked on the context thread.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The context thread could not be started or joined.
    #[error("execution context thread error: {0}")]
    Thread(String),
}

/// Cloneable handle used to post work onto the execution context.
#[derive(Debug, Clone)]
pub struct ContextHandle {
    tx: mpsc::Sender<Message>,
    default_timeout: Duration,
}

impl ContextHandle {
    /// Run `task` on the context thread and wait for its result, bounded by
    /// the default handoff timeout.
    pub async fn submit<F, R>(&self, task: F) -> Result<R, ContextError>
    where
        F: FnOnce(&mut SimulationState) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.submit_within(self.default_timeout, task).await
    }

    /// Run `task` on the context thread and wait at most `timeout`.
    pub async fn submit_within<F, R>(&self, timeout: Duration, task: F) -> Result<R, ContextError>
    where
        F: FnOnce(&mut SimulationState) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel::<Result<R, ContextError>>();

        let job: Job = Box::new(move |state: &mut SimulationState| {
            let outcome = catch_unwind(AssertUnwindSafe(|| task(state)))
                .map_err(|payload| ContextError::Panicked(panic_message(payload.as_ref())));
            // The receiver is gone when the caller already timed out.
            let _ = done_tx.send(outcome);
        });

        self.tx
            .send(Message::Run(job))
            .map_err(|_closed| ContextError::Closed)?;

        match tokio::time::timeout(timeout, done_rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_dropped)) => Err(ContextError::Closed),
            Err(_elapsed) => Err(ContextError::Timeout {
                after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Post `task` without waiting for it.
    pub fn post<F>(&self, task: F) -> Result<(), ContextError>
    where
        F: FnOnce(&mut SimulationState) + Send + 'static,
    {
        let job: Job = Box::new(move |state: &mut SimulationState| {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| task(state))) {
                warn!(panic = %panic_message(payload.as_ref()), "Posted task panicked");
            }
        });
        self.tx
            .send(Message::Run(job))
            .map_err(|_closed| ContextError::Closed)
    }
}

/// Owner of the context thread.
///
/// Dropping it without calling [`shutdown`](Self::shutdown) leaves the
/// thread running until every [`ContextHandle`] is dropped.
#[derive(Debug)]
pub struct ExecutionContext {
    handle: ContextHandle,
    thread: JoinHandle<SimulationState>,
}

impl ExecutionContext {
    /// Spawn the context thread with the given state and tick interval.
    pub fn spawn(
        state: SimulationState,
        tick_interval: Duration,
        handoff_timeout: Duration,
    ) -> Result<Self, ContextError> {
        Self::spawn_with_hook(state, tick_interval, handoff_timeout, None)
    }

    /// Spawn the context thread, running `on_tick` after every tick.
    pub fn spawn_with_hook(
        state: SimulationState,
        tick_interval: Duration,
        handoff_timeout: Duration,
        on_tick: Option<TickHook>,
    ) -> Result<Self, ContextError> {
        let (tx, rx) = mpsc::channel::<Message>();
        let thread = std::thread::Builder::new()
            .name("simgate-context".to_owned())
            .spawn(move || run_loop(state, &rx, tick_interval, on_tick))
            .map_err(|e| ContextError::Thread(e.to_string()))?;

        info!(
            tick_interval_ms = u64::try_from(tick_interval.as_millis()).unwrap_or(u64::MAX),
            "Execution context started"
        );

        Ok(Self {
            handle: ContextHandle {
                tx,
                default_timeout: handoff_timeout,
            },
            thread,
        })
    }

    /// A handle for posting work.
    pub fn handle(&self) -> ContextHandle {
        self.handle.clone()
    }

    /// Stop the context after the tasks already queued and return the
    /// final state.
    pub fn shutdown(self) -> Result<SimulationState, ContextError> {
        // Ignore send failure: the thread may already have exited.
        let _ = self.handle.tx.send(Message::Shutdown);
        self.thread
            .join()
            .map_err(|payload| ContextError::Thread(panic_message(payload.as_ref())))
    }
}

fn run_loop(
    mut state: SimulationState,
    rx: &mpsc::Receiver<Message>,
    tick_interval: Duration,
    mut on_tick: Option<TickHook>,
) -> SimulationState {
    let mut next_tick = advance(Instant::now(), tick_interval);

    loop {
        let wait = next_tick.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(Message::Run(job)) => job(&mut state),
            Ok(Message::Shutdown) => {
                // Drain what is already queued so no waiting caller is left
                // hanging until its timeout.
                while let Ok(Message::Run(job)) = rx.try_recv() {
                    job(&mut state);
                }
                break;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        if Instant::now() >= next_tick {
            state.advance_tick();
            if let Some(hook) = on_tick.as_mut()
                && let Err(payload) = catch_unwind(AssertUnwindSafe(|| hook(&mut state)))
            {
                warn!(tick = state.tick, panic = %panic_message(payload.as_ref()), "Tick hook panicked");
            }
            next_tick = advance(next_tick, tick_interval);
        }
    }

    debug!(tick = state.tick, "Execution context loop exited");
    state
}

fn advance(from: Instant, by: Duration) -> Instant {
    from.checked_add(by).unwrap_or(from)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
