//! Batches of validators run against one source.
//!
//! A suite runs every validator concurrently and collects one outcome per
//! validator instead of stopping at the first failure. Awaits share a single
//! deadline, so a wrong target costs the timeout once, not once per check.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures_util::future::join_all;
use statecheck_core::{CheckConfig, FailureKind, ValidationError};
use statecheck_source::StateSource;
use tokio::time::Instant;

use crate::validator::Validator;

/// An ordered set of validators over one source type.
pub struct ValidatorSuite<S: StateSource> {
    validators: Vec<Box<dyn Validator<S>>>,
}

impl<S: StateSource> Default for ValidatorSuite<S> {
    fn default() -> Self {
        Self {
            validators: Vec::new(),
        }
    }
}

impl<S: StateSource> fmt::Debug for ValidatorSuite<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.validators.iter().map(|vd| vd.path()))
            .finish()
    }
}

impl<S: StateSource> ValidatorSuite<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, validator: impl Validator<S> + 'static) -> &mut Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, validator: impl Validator<S> + 'static) -> Self {
        self.push(validator);
        self
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Check every validator once.
    pub async fn check_all(&self, source: &S) -> SuiteReport {
        let outcomes = join_all(
            self.validators
                .iter()
                .map(|vd| timed(vd.path(), vd.check(source))),
        )
        .await;
        SuiteReport::finish(outcomes)
    }

    /// Await every validator against the same wall-clock deadline.
    pub async fn await_all_until(&self, deadline: DateTime<Utc>, source: &S) -> SuiteReport {
        let outcomes = join_all(
            self.validators
                .iter()
                .map(|vd| timed(vd.path(), vd.await_until(deadline, source))),
        )
        .await;
        SuiteReport::finish(outcomes)
    }

    /// Await every validator for at most `timeout` in total.
    pub async fn await_all_for(&self, timeout: Duration, source: &S) -> SuiteReport {
        if timeout.is_zero() {
            return self.check_all(source).await;
        }
        self.await_all_until(deadline_after(timeout), source).await
    }

    /// Await every validator for the configured default timeout.
    pub async fn run(&self, config: &CheckConfig, source: &S) -> SuiteReport {
        tracing::debug!(
            validators = self.len(),
            timeout = ?config.default_timeout,
            "running validator suite"
        );
        self.await_all_for(config.default_timeout, source).await
    }
}

fn deadline_after(timeout: Duration) -> DateTime<Utc> {
    let delta = TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX);
    Utc::now()
        .checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

async fn timed<F>(path: String, run: F) -> SuiteOutcome
where
    F: Future<Output = Result<(), ValidationError>>,
{
    let started = Instant::now();
    let result = run.await;
    SuiteOutcome {
        path,
        result,
        elapsed: started.elapsed(),
    }
}

/// Result of one validator within a suite run.
#[derive(Debug)]
pub struct SuiteOutcome {
    pub path: String,
    pub result: Result<(), ValidationError>,
    pub elapsed: Duration,
}

impl SuiteOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&ValidationError> {
        self.result.as_ref().err()
    }
}

/// Counts over a [`SuiteReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Failures that ended on the deadline; a subset of `failed`.
    pub timed_out: usize,
}

impl fmt::Display for SuiteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} passed, {} failed ({} timed out)",
            self.passed, self.total, self.failed, self.timed_out
        )
    }
}

/// Outcomes of a suite run, in the order validators were pushed.
#[derive(Debug)]
pub struct SuiteReport {
    outcomes: Vec<SuiteOutcome>,
}

impl SuiteReport {
    fn finish(outcomes: Vec<SuiteOutcome>) -> Self {
        let report = Self { outcomes };
        let summary = report.summary();
        if summary.failed > 0 {
            tracing::info!(
                total = summary.total,
                failed = summary.failed,
                timed_out = summary.timed_out,
                "validator suite failed"
            );
        } else {
            tracing::debug!(total = summary.total, "validator suite passed");
        }
        report
    }

    pub fn outcomes(&self) -> &[SuiteOutcome] {
        &self.outcomes
    }

    pub fn passed(&self) -> impl Iterator<Item = &SuiteOutcome> {
        self.outcomes.iter().filter(|o| o.passed())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ValidationError> {
        self.outcomes.iter().filter_map(SuiteOutcome::error)
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(SuiteOutcome::passed)
    }

    pub fn summary(&self) -> SuiteSummary {
        let mut summary = SuiteSummary {
            total: self.outcomes.len(),
            ..SuiteSummary::default()
        };
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(()) => summary.passed += 1,
                Err(err) => {
                    summary.failed += 1;
                    if err.is_timeout() {
                        summary.timed_out += 1;
                    }
                }
            }
        }
        summary
    }

    /// Errors grouped by how they failed.
    pub fn failures_of(&self, kind: FailureKind) -> impl Iterator<Item = &ValidationError> {
        self.failures().filter(move |err| err.kind() == kind)
    }

    pub fn into_result(self) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<_> = self
            .outcomes
            .into_iter()
            .filter_map(|o| o.result.err())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())?;
        for err in self.failures() {
            write!(f, "\n  {}", err)?;
        }
        Ok(())
    }
}
