//! The state source capability.
//!
//! A state source owns the actual state tree (a device session, a test
//! double, a recorded trace) and exposes exactly two operations: a one-shot
//! lookup and a continuous watch.

use std::fmt::Debug;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use statecheck_core::{FetchResult, Query, Value};
use tokio_stream::Stream;

/// Types a query can decode into.
///
/// Blanket-implemented; anything deserializable and debuggable qualifies.
pub trait StateValue: DeserializeOwned + Debug + Send + Sync + 'static {}

impl<T> StateValue for T where T: DeserializeOwned + Debug + Send + Sync + 'static {}

/// Successive observations of one path.
///
/// The first item is the value at subscription time; each later item is an
/// update. An `Err` item or the end of the stream means no further values
/// will arrive.
pub type ValueStream<T> = Pin<Box<dyn Stream<Item = FetchResult<Value<T>>> + Send>>;

/// Source of path-addressed state.
///
/// Implementations must be safe to share between concurrently running
/// validators.
#[async_trait]
pub trait StateSource: Send + Sync {
    /// Fetch the current value of `query` once.
    ///
    /// An unset node is `Ok` with an absent value; `Err` means the source
    /// could not answer at all.
    async fn lookup<T: StateValue>(&self, query: &Query<T>) -> FetchResult<Value<T>>;

    /// Subscribe to `query`, starting with its current value.
    async fn watch<T: StateValue>(&self, query: &Query<T>) -> FetchResult<ValueStream<T>>;
}

#[async_trait]
impl<S: StateSource> StateSource for Arc<S> {
    async fn lookup<T: StateValue>(&self, query: &Query<T>) -> FetchResult<Value<T>> {
        self.as_ref().lookup(query).await
    }

    async fn watch<T: StateValue>(&self, query: &Query<T>) -> FetchResult<ValueStream<T>> {
        self.as_ref().watch(query).await
    }
}
