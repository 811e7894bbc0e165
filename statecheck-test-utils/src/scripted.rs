//! A state source that replays a fixed script.
//!
//! Where [`InMemoryStateSource`](statecheck_source::InMemoryStateSource)
//! models real state, `ScriptedSource` models a transport: it answers every
//! path the same way, can fail on cue, and controls exactly what a watch
//! delivers and how the stream ends.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde_json::Value as Json;
use statecheck_core::{FetchError, FetchResult, Query, Resolve, StatePath, Value};
use statecheck_source::{StateSource, StateValue, ValueStream};

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Step {
    Value(Json),
    Absent,
    Fail(FetchError),
}

impl Step {
    pub fn value(value: impl Into<Json>) -> Self {
        Step::Value(value.into())
    }

    fn resolve<T: StateValue>(self, path: &StatePath) -> FetchResult<Value<T>> {
        match self {
            Step::Value(json) => {
                let value: T = serde_json::from_value(json)?;
                Ok(Value::present(path.clone(), value))
            }
            Step::Absent => Ok(Value::absent(path.clone())),
            Step::Fail(err) => Err(err),
        }
    }
}

/// What a watch does after its scripted updates run out.
#[derive(Debug, Clone, Default)]
pub enum StreamEnd {
    /// Stay open without delivering anything else.
    #[default]
    Pending,
    /// End the stream.
    Close,
    /// Deliver one error item.
    Fail(FetchError),
}

/// Scripted [`StateSource`].
///
/// Lookups consume the lookup script front to back; the last step repeats
/// once the script is down to one entry. An empty script answers absent.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    lookup_script: Mutex<VecDeque<Step>>,
    updates: Vec<Step>,
    spacing: Duration,
    end: StreamEnd,
    watch_error: Option<FetchError>,
    lookups: AtomicUsize,
    watches: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a source whose every lookup returns `value`.
    pub fn returning(value: impl Into<Json>) -> Self {
        Self::new().with_lookup(Step::value(value))
    }

    pub fn with_lookup(self, step: Step) -> Self {
        self.lookup_script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(step);
        self
    }

    /// Items every watch delivers, in order.
    pub fn with_updates(mut self, updates: impl IntoIterator<Item = Step>) -> Self {
        self.updates.extend(updates);
        self
    }

    /// Wait `spacing` before each watch item.
    pub fn spaced_by(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn ending(mut self, end: StreamEnd) -> Self {
        self.end = end;
        self
    }

    /// Refuse to open watches.
    pub fn failing_watch(mut self, err: FetchError) -> Self {
        self.watch_error = Some(err);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    pub fn watches(&self) -> usize {
        self.watches.load(Ordering::Relaxed)
    }

    fn next_lookup(&self) -> Step {
        let mut script = self
            .lookup_script
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if script.len() > 1 {
            script.pop_front().unwrap_or(Step::Absent)
        } else {
            script.front().cloned().unwrap_or(Step::Absent)
        }
    }
}

#[async_trait]
impl StateSource for ScriptedSource {
    async fn lookup<T: StateValue>(&self, query: &Query<T>) -> FetchResult<Value<T>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let path = query.resolve()?;
        let step = self.next_lookup();
        tracing::trace!(path = %path, ?step, "scripted lookup");
        step.resolve(&path)
    }

    async fn watch<T: StateValue>(&self, query: &Query<T>) -> FetchResult<ValueStream<T>> {
        self.watches.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = &self.watch_error {
            return Err(err.clone());
        }
        let path = query.resolve()?;

        let items: Vec<FetchResult<Value<T>>> = self
            .updates
            .iter()
            .cloned()
            .map(|step| step.resolve(&path))
            .collect();
        let spacing = self.spacing;
        let scripted = stream::iter(items).then(move |item| async move {
            if !spacing.is_zero() {
                tokio::time::sleep(spacing).await;
            }
            item
        });

        let stream: ValueStream<T> = match self.end.clone() {
            StreamEnd::Pending => Box::pin(scripted.chain(stream::pending())),
            StreamEnd::Close => Box::pin(scripted),
            StreamEnd::Fail(err) => Box::pin(scripted.chain(stream::once(async move { Err(err) }))),
        };
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecheck_core::FetchErrorKind;

    fn query() -> Query<u32> {
        Query::parse("/a/b")
    }

    #[tokio::test]
    async fn test_lookup_script_repeats_last_step() {
        let source = ScriptedSource::new()
            .with_lookup(Step::Fail(FetchError::unavailable("warming up")))
            .with_lookup(Step::value(7));

        assert_eq!(
            source.lookup(&query()).await.unwrap_err().kind(),
            FetchErrorKind::Unavailable
        );
        for _ in 0..3 {
            assert_eq!(source.lookup(&query()).await.unwrap().val(), Some(&7));
        }
        assert_eq!(source.lookups(), 4);
    }

    #[tokio::test]
    async fn test_empty_script_is_absent() {
        let value = ScriptedSource::new().lookup(&query()).await.unwrap();
        assert!(!value.is_present());
        assert_eq!(value.path().to_string(), "/a/b");
    }

    #[tokio::test]
    async fn test_watch_closes_after_updates() {
        let source = ScriptedSource::new()
            .with_updates([Step::value(1), Step::Absent])
            .ending(StreamEnd::Close);
        let items: Vec<_> = source.watch(&query()).await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().val(), Some(&1));
        assert!(!items[1].as_ref().unwrap().is_present());
    }

    #[tokio::test]
    async fn test_watch_ends_with_error() {
        let source = ScriptedSource::new().ending(StreamEnd::Fail(FetchError::unavailable("gone")));
        let mut stream = source.watch(&query()).await.unwrap();
        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_decode_failure_surfaces_as_item() {
        let source = ScriptedSource::new()
            .with_updates([Step::value("not a number")])
            .ending(StreamEnd::Close);
        let mut stream = source.watch(&query()).await.unwrap();
        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Decode);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_delays_each_item() {
        let source = ScriptedSource::new()
            .with_updates([Step::value(1), Step::value(2)])
            .spaced_by(Duration::from_millis(100));
        let started = tokio::time::Instant::now();
        let mut stream = source.watch(&query()).await.unwrap();
        stream.next().await;
        stream.next().await;
        assert!(started.elapsed() >= Duration::from_millis(200));

        let pending = tokio::time::timeout(Duration::from_secs(60), stream.next()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_failing_watch() {
        let source = ScriptedSource::new().failing_watch(FetchError::unavailable("no subscriptions"));
        assert!(source.watch(&query()).await.is_err());
        assert_eq!(source.watches(), 1);
    }
}
