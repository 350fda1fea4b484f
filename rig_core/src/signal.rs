//! Ambient cancellation signal shared by guarded requests and health checks.
//!
//! A [`Signal`] pairs a [`CancellationToken`] with an optional deadline. Children
//! derived from a signal are cancelled together with their parent and never
//! outlive the parent's deadline.

use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SignalError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Clone)]
pub struct Signal {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Signal {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Derives a child that is cancelled with this signal and keeps its deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derives a child whose deadline is `timeout` from now, or the parent's
    /// deadline if that comes first.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };

        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline_elapsed()
    }

    /// Why the signal is done, or `None` while it is still live.
    pub fn error(&self) -> Option<SignalError> {
        if self.deadline_elapsed() {
            Some(SignalError::DeadlineExceeded)
        } else if self.token.is_cancelled() {
            Some(SignalError::Cancelled)
        } else {
            None
        }
    }

    /// Resolves once the signal is cancelled or its deadline is reached.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Cancels this signal when the returned guard is dropped.
    pub fn drop_guard(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    fn deadline_elapsed(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for Signal
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Signal>()
            .cloned()
            .unwrap_or_default())
    }
}
