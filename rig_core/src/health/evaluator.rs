//! Runs a check collection under per-check deadlines and folds the outcomes
//! into a single report

use super::checks::{Check, CheckKind, CheckOutcome, Probe};
use super::registry::CheckRegistry;
use crate::race::{race, race_blocking, RaceOutcome};
use crate::signal::Signal;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "Service Unavailable")]
    ServiceUnavailable,
}

impl AggregateStatus {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AggregateStatus::Ok => StatusCode::OK,
            AggregateStatus::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl std::fmt::Display for AggregateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateStatus::Ok => write!(f, "OK"),
            AggregateStatus::ServiceUnavailable => write!(f, "Service Unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub status: AggregateStatus,
    pub checks: BTreeMap<String, String>,
}

impl EvaluationReport {
    /// Healthy iff no outcome failed; an empty collection is healthy.
    pub fn from_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = CheckOutcome>,
    {
        let mut status = AggregateStatus::Ok;
        let mut checks = BTreeMap::new();

        for outcome in outcomes {
            if outcome.failed {
                status = AggregateStatus::ServiceUnavailable;
            }
            checks.insert(outcome.name, outcome.status);
        }

        Self { status, checks }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == AggregateStatus::Ok
    }

    pub fn status_code(&self) -> StatusCode {
        self.status.status_code()
    }
}

impl IntoResponse for EvaluationReport {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

#[derive(Debug, Clone)]
pub struct HealthEvaluator {
    registry: Arc<CheckRegistry>,
}

impl HealthEvaluator {
    pub fn new(registry: Arc<CheckRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<CheckRegistry> {
        &self.registry
    }

    pub async fn liveness(&self, signal: &Signal) -> EvaluationReport {
        self.evaluate(CheckKind::Liveness, signal).await
    }

    pub async fn readiness(&self, signal: &Signal) -> EvaluationReport {
        self.evaluate(CheckKind::Readiness, signal).await
    }

    /// Evaluates every check in `kind`. Cancelling `signal` cancels the
    /// in-flight cancelable checks.
    pub async fn evaluate(&self, kind: CheckKind, signal: &Signal) -> EvaluationReport {
        let checks = self.registry.snapshot(kind);
        let config = self.registry.config();
        let global = config.check_timeout();
        let start = Instant::now();

        let outcomes: Vec<CheckOutcome> = if config.parallel {
            join_all(checks.into_iter().map(|check| {
                let name = check.name.clone();
                let worker = tokio::spawn(run_check(check, signal.clone(), global));
                async move {
                    worker.await.unwrap_or_else(|e| {
                        warn!(check = %name, "health check worker failed to join: {}", e);
                        CheckOutcome::faulted(name, e, Duration::ZERO)
                    })
                }
            }))
            .await
        } else {
            let mut outcomes = Vec::with_capacity(checks.len());
            for check in checks {
                outcomes.push(run_check(check, signal.clone(), global).await);
            }
            outcomes
        };

        let report = EvaluationReport::from_outcomes(outcomes);

        info!(
            kind = %kind,
            checks = report.checks.len(),
            parallel = config.parallel,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "{} evaluation completed - status: {}",
            kind,
            report.status
        );

        report
    }
}

/// Runs one check under its effective timeout. Never fails: errors, timeouts
/// and panics all become a failed outcome.
pub async fn run_check(check: Check, parent: Signal, global: Duration) -> CheckOutcome {
    let timeout = check.effective_timeout(global);
    let signal = parent.with_timeout(timeout);
    let start = Instant::now();

    let raced = match check.probe {
        Probe::Plain(probe) => race_blocking(&signal, move || probe()).await,
        Probe::Cancelable(probe) => {
            let probe_signal = signal.clone();
            race(&signal, async move { probe.probe(probe_signal).await }).await
        }
    };

    let elapsed = start.elapsed();
    let outcome = match raced {
        RaceOutcome::Completed(Ok(Ok(()))) => CheckOutcome::ok(check.name, elapsed),
        RaceOutcome::Completed(Ok(Err(e))) => {
            CheckOutcome::failed(check.name, format!("{:#}", e), elapsed)
        }
        RaceOutcome::Completed(Err(fault)) => CheckOutcome::faulted(check.name, fault, elapsed),
        RaceOutcome::TimedOut => CheckOutcome::timed_out(check.name, elapsed),
    };

    if outcome.failed {
        warn!(
            check = %outcome.name,
            elapsed_ms = elapsed.as_millis() as u64,
            timeout_ms = timeout.as_millis() as u64,
            "health check failed: {}",
            outcome.status
        );
    } else {
        debug!(
            check = %outcome.name,
            elapsed_ms = elapsed.as_millis() as u64,
            "health check passed"
        );
    }

    outcome
}
