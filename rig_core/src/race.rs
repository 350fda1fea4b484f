//! Deadline race: run work on its own worker and settle on whichever comes
//! first, the work's result or the signal being done.
//!
//! The worker publishes into a one-shot completion cell, so it can always exit
//! even after the caller stopped listening. Panics are caught at the worker
//! boundary and published as a [`Fault`].

use crate::signal::Signal;
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::error;

#[derive(Debug)]
pub enum RaceOutcome<T> {
    Completed(T),
    TimedOut,
}

impl<T> RaceOutcome<T> {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, RaceOutcome::TimedOut)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            RaceOutcome::Completed(value) => Some(value),
            RaceOutcome::TimedOut => None,
        }
    }
}

/// A worker that panicked or vanished without publishing a result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct Fault {
    message: String,
}

impl Fault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_string()
        };

        error!("recovered panic in worker: {}", detail);
        Self::new(format!("panicked: {}", detail))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type Completion<T> = Result<T, Fault>;

/// Races an async unit of work against `signal`.
///
/// When the signal wins it is cancelled, so work holding a clone of it can
/// stop promptly.
pub async fn race<Fut>(signal: &Signal, work: Fut) -> RaceOutcome<Completion<Fut::Output>>
where
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let outcome = AssertUnwindSafe(work)
            .catch_unwind()
            .await
            .map_err(Fault::from_panic);
        let _ = tx.send(outcome);
    });

    settle(signal, rx).await
}

/// Races a synchronous unit of work against `signal`.
///
/// The work runs on the blocking pool and cannot be interrupted; after a
/// timeout it is abandoned and finishes on its own.
pub async fn race_blocking<F, T>(signal: &Signal, work: F) -> RaceOutcome<Completion<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();

    tokio::task::spawn_blocking(move || {
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(work)).map_err(Fault::from_panic);
        let _ = tx.send(outcome);
    });

    settle(signal, rx).await
}

async fn settle<T>(
    signal: &Signal,
    rx: oneshot::Receiver<Completion<T>>,
) -> RaceOutcome<Completion<T>> {
    tokio::select! {
        received = rx => match received {
            Ok(outcome) => RaceOutcome::Completed(outcome),
            Err(_) => RaceOutcome::Completed(Err(Fault::new("worker exited without a result"))),
        },
        _ = signal.done() => {
            signal.cancel();
            RaceOutcome::TimedOut
        }
    }
}
