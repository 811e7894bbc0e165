//! Validator core.
//!
//! A [`Validation<T>`] pairs one [`Query<T>`] with a validation function and
//! knows how to run it against a [`StateSource`]: once ([`check`]), or
//! repeatedly until it passes or a wait budget runs out ([`await_with`],
//! [`await_for`], [`await_until`]).
//!
//! [`check`]: Validator::check
//! [`await_with`]: Validator::await_with
//! [`await_for`]: Validator::await_for
//! [`await_until`]: Validator::await_until

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use statecheck_core::{
    format_path, format_relative_path, FetchError, Mismatch, Query, StatePath, ValidationError,
    Value,
};
use statecheck_source::{StateSource, StateValue};
use tokio_stream::StreamExt;

use crate::context::AwaitContext;

/// Judges one fetched value: `Ok` passes, `Err` describes what was wrong.
pub type ValidationFn<T> = Arc<dyn Fn(&Value<T>) -> Result<(), Mismatch> + Send + Sync>;

/// A check against one path that may need time to become true.
///
/// Object safe, so validators over different value types can share a table:
///
/// ```ignore
/// let validators: Vec<Box<dyn Validator<InMemoryStateSource>>> = vec![
///     Box::new(equal(hostname, "node1".to_string())),
///     Box::new(present::<u64>(boot_time)),
/// ];
/// let deadline = Utc::now() + chrono::Duration::seconds(1);
/// for vd in &validators {
///     vd.await_until(deadline, &source).await?;
/// }
/// ```
///
/// Prefer one shared deadline with [`await_until`](Validator::await_until)
/// over [`await_for`](Validator::await_for) per validator, or a failing
/// target costs the full timeout once per validator.
#[async_trait]
pub trait Validator<S: StateSource>: Send + Sync {
    /// Fetch the value once and validate it.
    async fn check(&self, source: &S) -> Result<(), ValidationError>;

    /// Check, and if the value was fetched but wrong, watch for a passing
    /// value until `ctx` ends.
    ///
    /// At least one fetch always happens, even with an expired context.
    /// Fetch failures are returned immediately and never waited out.
    async fn await_with(&self, ctx: &AwaitContext, source: &S) -> Result<(), ValidationError>;

    /// Await with a budget of `timeout`; a zero timeout is exactly
    /// [`check`](Validator::check).
    async fn await_for(&self, timeout: Duration, source: &S) -> Result<(), ValidationError> {
        if timeout.is_zero() {
            return self.check(source).await;
        }
        let ctx = AwaitContext::timeout(timeout);
        self.await_with(&ctx, source).await
    }

    /// Await until `deadline`; a deadline that is not in the future is
    /// exactly [`check`](Validator::check).
    async fn await_until(
        &self,
        deadline: DateTime<Utc>,
        source: &S,
    ) -> Result<(), ValidationError> {
        match (deadline - Utc::now()).to_std() {
            Ok(remaining) if !remaining.is_zero() => self.await_for(remaining, source).await,
            _ => self.check(source).await,
        }
    }

    /// The validated path, for naming test cases and reports.
    fn path(&self) -> String;

    /// The validated path relative to `base`.
    fn rel_path(&self, base: &StatePath) -> String;
}

/// The standard [`Validator`]: a query plus a validation function.
///
/// Immutable and stateless; every run fetches afresh.
pub struct Validation<T> {
    query: Query<T>,
    validation_fn: ValidationFn<T>,
}

impl<T> Validation<T> {
    pub fn new<F>(query: Query<T>, validation_fn: F) -> Self
    where
        F: Fn(&Value<T>) -> Result<(), Mismatch> + Send + Sync + 'static,
    {
        Self {
            query,
            validation_fn: Arc::new(validation_fn),
        }
    }

    pub fn query(&self) -> &Query<T> {
        &self.query
    }

    /// Apply the validation function to an already-fetched value.
    pub fn validate_value(&self, value: &Value<T>) -> Result<(), Mismatch> {
        (self.validation_fn)(value)
    }

    /// The validated path; same as [`Validator::path`] without naming a
    /// source type.
    pub fn path(&self) -> String {
        self.path_string()
    }

    pub fn rel_path(&self, base: &StatePath) -> String {
        format_relative_path(Some(base), Some(&self.query))
    }

    fn path_string(&self) -> String {
        format_path(Some(&self.query))
    }
}

impl<T> Clone for Validation<T> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            validation_fn: Arc::clone(&self.validation_fn),
        }
    }
}

impl<T> fmt::Debug for Validation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validation")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S, T> Validator<S> for Validation<T>
where
    S: StateSource,
    T: StateValue,
{
    async fn check(&self, source: &S) -> Result<(), ValidationError> {
        let value = match source.lookup(&self.query).await {
            Ok(value) => value,
            Err(cause) => {
                tracing::debug!(path = %self.path_string(), error = %cause, "lookup failed");
                return Err(ValidationError::fetch_failed(&self.query, cause));
            }
        };

        match self.validate_value(&value) {
            Ok(()) => {
                tracing::trace!(path = %self.path_string(), "check passed");
                Ok(())
            }
            Err(mismatch) => {
                tracing::debug!(path = %self.path_string(), %mismatch, "check failed");
                Err(ValidationError::mismatch(&self.query, mismatch))
            }
        }
    }

    async fn await_with(&self, ctx: &AwaitContext, source: &S) -> Result<(), ValidationError> {
        let first = match self.check(source).await {
            Ok(()) => return Ok(()),
            Err(err) if err.failure_cause().is_some() => return Err(err),
            Err(err) => err,
        };

        let path = self.path_string();
        let mut last_mismatch: Option<Mismatch> = first.validation_err().cloned();
        tracing::debug!(path = %path, "value not valid yet, watching for updates");

        let opened = tokio::select! {
            biased;
            cause = ctx.done() => Err(cause),
            opened = source.watch(&self.query) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(cause) => return Err(wait_ended(&self.query, cause, last_mismatch)),
        };

        loop {
            let next = tokio::select! {
                biased;
                cause = ctx.done() => Err(cause),
                item = stream.next() => Ok(item),
            };

            let cause = match next {
                Ok(Some(Ok(value))) => match self.validate_value(&value) {
                    Ok(()) => {
                        tracing::debug!(path = %path, "await passed");
                        return Ok(());
                    }
                    Err(mismatch) => {
                        tracing::trace!(path = %path, %mismatch, "update still not valid");
                        last_mismatch = Some(mismatch);
                        continue;
                    }
                },
                Ok(Some(Err(cause))) => cause,
                Ok(None) => FetchError::stream_closed(),
                Err(cause) => cause,
            };
            return Err(wait_ended(&self.query, cause, last_mismatch));
        }
    }

    fn path(&self) -> String {
        self.path_string()
    }

    fn rel_path(&self, base: &StatePath) -> String {
        format_relative_path(Some(base), Some(&self.query))
    }
}

fn wait_ended<T>(
    query: &Query<T>,
    cause: FetchError,
    last_mismatch: Option<Mismatch>,
) -> ValidationError {
    let err = ValidationError::wait_ended(query, cause, last_mismatch);
    tracing::debug!(
        path = %err.path(),
        error = ?err.failure_cause(),
        "await ended without a passing value"
    );
    err
}
