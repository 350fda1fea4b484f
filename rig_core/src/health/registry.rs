//! Thread-safe registration of liveness and readiness checks

use super::checks::{Check, CheckKind, Probe, ProbeResult};
use crate::config::HealthConfig;
use crate::error::{AppError, Result};
use crate::signal::Signal;
use parking_lot::RwLock;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct Collections {
    liveness: Vec<Check>,
    readiness: Vec<Check>,
}

impl Collections {
    fn get(&self, kind: CheckKind) -> &Vec<Check> {
        match kind {
            CheckKind::Liveness => &self.liveness,
            CheckKind::Readiness => &self.readiness,
        }
    }

    fn get_mut(&mut self, kind: CheckKind) -> &mut Vec<Check> {
        match kind {
            CheckKind::Liveness => &mut self.liveness,
            CheckKind::Readiness => &mut self.readiness,
        }
    }
}

/// Owns both check collections. Registration takes the write lock;
/// evaluation only copies a snapshot under the read lock.
#[derive(Debug, Default)]
pub struct CheckRegistry {
    checks: RwLock<Collections>,
    config: HealthConfig,
}

impl CheckRegistry {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            checks: RwLock::new(Collections::default()),
            config,
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Appends `check` to the `kind` collection. Names are unique per collection.
    pub fn register(&self, kind: CheckKind, check: Check) -> Result<()> {
        let mut checks = self.checks.write();
        let collection = checks.get_mut(kind);

        if collection.iter().any(|existing| existing.name == check.name) {
            return Err(AppError::DuplicateCheck {
                kind,
                name: check.name,
            });
        }

        debug!(
            kind = %kind,
            check = %check.name,
            cancelable = check.probe.is_cancelable(),
            timeout_ms = check.timeout.map(|t| t.as_millis() as u64),
            "registered health check"
        );
        collection.push(check);
        Ok(())
    }

    pub fn add_check(
        &self,
        kind: CheckKind,
        name: impl Into<String>,
        probe: Probe,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let mut check = Check::new(name, probe);
        check.timeout = timeout;
        self.register(kind, check)
    }

    pub fn add_liveness_check<F>(&self, name: impl Into<String>, probe: F) -> Result<()>
    where
        F: Fn() -> ProbeResult + Send + Sync + 'static,
    {
        self.add_check(CheckKind::Liveness, name, Probe::plain(probe), None)
    }

    pub fn add_liveness_check_cancelable<F, Fut>(&self, name: impl Into<String>, probe: F) -> Result<()>
    where
        F: Fn(Signal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProbeResult> + Send + 'static,
    {
        self.add_check(CheckKind::Liveness, name, Probe::cancelable(probe), None)
    }

    pub fn add_liveness_check_with_timeout<F, Fut>(
        &self,
        name: impl Into<String>,
        timeout: Duration,
        probe: F,
    ) -> Result<()>
    where
        F: Fn(Signal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProbeResult> + Send + 'static,
    {
        self.add_check(CheckKind::Liveness, name, Probe::cancelable(probe), Some(timeout))
    }

    pub fn add_readiness_check<F>(&self, name: impl Into<String>, probe: F) -> Result<()>
    where
        F: Fn() -> ProbeResult + Send + Sync + 'static,
    {
        self.add_check(CheckKind::Readiness, name, Probe::plain(probe), None)
    }

    pub fn add_readiness_check_cancelable<F, Fut>(&self, name: impl Into<String>, probe: F) -> Result<()>
    where
        F: Fn(Signal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProbeResult> + Send + 'static,
    {
        self.add_check(CheckKind::Readiness, name, Probe::cancelable(probe), None)
    }

    pub fn add_readiness_check_with_timeout<F, Fut>(
        &self,
        name: impl Into<String>,
        timeout: Duration,
        probe: F,
    ) -> Result<()>
    where
        F: Fn(Signal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProbeResult> + Send + 'static,
    {
        self.add_check(CheckKind::Readiness, name, Probe::cancelable(probe), Some(timeout))
    }

    /// Copies the collection so evaluation runs without holding the lock.
    pub fn snapshot(&self, kind: CheckKind) -> Vec<Check> {
        self.checks.read().get(kind).clone()
    }

    pub fn len(&self, kind: CheckKind) -> usize {
        self.checks.read().get(kind).len()
    }

    pub fn is_empty(&self, kind: CheckKind) -> bool {
        self.len(kind) == 0
    }

    pub fn names(&self, kind: CheckKind) -> Vec<String> {
        self.checks
            .read()
            .get(kind)
            .iter()
            .map(|check| check.name.clone())
            .collect()
    }
}
