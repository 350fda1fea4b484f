//! Bounded execution for a single request-handling unit.
//!
//! The inner work and the timeout path both try to commit through the same
//! [`ResponseWriteState`]. Whoever flips `written` first owns the response;
//! the loser never produces a second one.

use crate::race::{Completion, Fault};
use crate::signal::{Signal, SignalError};
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Per-request flag recording whether a response has been committed.
#[derive(Debug, Clone, Default)]
pub struct ResponseWriteState {
    written: Arc<Mutex<bool>>,
}

impl ResponseWriteState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_written(&self) -> bool {
        *self.written.lock()
    }

    /// Compare-and-commit: returns `true` only for the first caller.
    pub fn try_commit(&self) -> bool {
        let mut written = self.written.lock();
        if *written {
            return false;
        }
        *written = true;
        true
    }
}

#[derive(Debug)]
pub enum GuardOutcome<T> {
    /// The inner work committed first.
    Completed(T),
    /// The inner work panicked; nothing it produced was committed.
    Faulted(Fault),
    /// The deadline fired first and the fallback was committed.
    TimedOut(T),
    /// The signal fired after a commit whose outcome could not be recovered.
    Cancelled(SignalError),
}

/// Runs `work` on its own task under `signal`, falling back to `on_timeout`
/// when the signal is done before the work commits.
pub async fn run_guarded<Fut, F>(
    signal: &Signal,
    state: &ResponseWriteState,
    work: Fut,
    on_timeout: F,
) -> GuardOutcome<Fut::Output>
where
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
    F: FnOnce() -> Fut::Output,
{
    let (tx, mut rx) = oneshot::channel::<Completion<Fut::Output>>();
    let worker_state = state.clone();

    tokio::spawn(async move {
        let outcome = AssertUnwindSafe(work)
            .catch_unwind()
            .await
            .map_err(Fault::from_panic);
        publish(&worker_state, tx, outcome);
    });

    tokio::select! {
        received = &mut rx => match received {
            Ok(Ok(value)) => GuardOutcome::Completed(value),
            Ok(Err(fault)) => GuardOutcome::Faulted(fault),
            Err(_) => GuardOutcome::Faulted(Fault::new("handler exited without a response")),
        },
        _ = signal.done() => {
            signal.cancel();
            resolve_timeout(signal, state, &mut rx, on_timeout)
        }
    }
}

// Commit and publish under one critical section so the timeout path always
// finds the outcome once it sees `written`.
fn publish<T>(
    state: &ResponseWriteState,
    tx: oneshot::Sender<Completion<T>>,
    outcome: Completion<T>,
) {
    let mut written = state.written.lock();
    if *written {
        debug!("discarding response produced after the deadline");
        return;
    }
    *written = true;
    let _ = tx.send(outcome);
}

fn resolve_timeout<T, F>(
    signal: &Signal,
    state: &ResponseWriteState,
    rx: &mut oneshot::Receiver<Completion<T>>,
    on_timeout: F,
) -> GuardOutcome<T>
where
    F: FnOnce() -> T,
{
    if state.try_commit() {
        warn!("handler did not respond before the deadline, sending fallback");
        return GuardOutcome::TimedOut(on_timeout());
    }

    match rx.try_recv() {
        Ok(Ok(value)) => GuardOutcome::Completed(value),
        Ok(Err(fault)) => GuardOutcome::Faulted(fault),
        Err(_) => GuardOutcome::Cancelled(signal.error().unwrap_or(SignalError::Cancelled)),
    }
}
