//! Check definitions and per-check outcomes for liveness and readiness probes

use crate::signal::Signal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const STATUS_OK: &str = "OK";
pub const TIMED_OUT_MESSAGE: &str = "check timed out";

pub type ProbeResult = anyhow::Result<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Liveness,
    Readiness,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::Liveness => write!(f, "liveness"),
            CheckKind::Readiness => write!(f, "readiness"),
        }
    }
}

/// A probe that observes its signal and stops once it is done.
#[async_trait::async_trait]
pub trait CancelableProbe: Send + Sync {
    async fn probe(&self, signal: Signal) -> ProbeResult;
}

#[async_trait::async_trait]
impl<F, Fut> CancelableProbe for F
where
    F: Fn(Signal) -> Fut + Send + Sync,
    Fut: Future<Output = ProbeResult> + Send + 'static,
{
    async fn probe(&self, signal: Signal) -> ProbeResult {
        (self)(signal).await
    }
}

#[derive(Clone)]
pub enum Probe {
    /// Synchronous probe; it cannot be interrupted once started.
    Plain(Arc<dyn Fn() -> ProbeResult + Send + Sync>),
    Cancelable(Arc<dyn CancelableProbe>),
}

impl Probe {
    pub fn plain<F>(probe: F) -> Self
    where
        F: Fn() -> ProbeResult + Send + Sync + 'static,
    {
        Probe::Plain(Arc::new(probe))
    }

    pub fn cancelable<P>(probe: P) -> Self
    where
        P: CancelableProbe + 'static,
    {
        Probe::Cancelable(Arc::new(probe))
    }

    pub fn is_cancelable(&self) -> bool {
        matches!(self, Probe::Cancelable(_))
    }
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::Plain(_) => f.write_str("Probe::Plain"),
            Probe::Cancelable(_) => f.write_str("Probe::Cancelable"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Check {
    pub name: String,
    pub probe: Probe,
    pub timeout: Option<Duration>,
}

impl Check {
    pub fn new(name: impl Into<String>, probe: Probe) -> Self {
        Self {
            name: name.into(),
            probe,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The per-check override when set, otherwise `global`. A zero override
    /// counts as unset.
    pub fn effective_timeout(&self, global: Duration) -> Duration {
        self.timeout.filter(|t| !t.is_zero()).unwrap_or(global)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckState {
    Completed,
    TimedOut,
    Faulted,
}

#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub name: String,
    pub status: String,
    pub failed: bool,
    pub state: CheckState,
    pub elapsed: Duration,
}

impl CheckOutcome {
    pub fn ok(name: String, elapsed: Duration) -> Self {
        Self {
            name,
            status: STATUS_OK.to_string(),
            failed: false,
            state: CheckState::Completed,
            elapsed,
        }
    }

    pub fn failed(name: String, message: impl fmt::Display, elapsed: Duration) -> Self {
        Self {
            name,
            status: format!("FAIL: {}", message),
            failed: true,
            state: CheckState::Completed,
            elapsed,
        }
    }

    pub fn timed_out(name: String, elapsed: Duration) -> Self {
        Self {
            state: CheckState::TimedOut,
            ..Self::failed(name, TIMED_OUT_MESSAGE, elapsed)
        }
    }

    pub fn faulted(name: String, message: impl fmt::Display, elapsed: Duration) -> Self {
        Self {
            state: CheckState::Faulted,
            ..Self::failed(name, format!("check {}", message), elapsed)
        }
    }
}
