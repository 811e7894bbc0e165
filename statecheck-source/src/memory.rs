//! In-memory state source.
//!
//! Leaves are stored as JSON and decoded into the query's type on every
//! fetch, the way a real transport would unmarshal a notification. Writes
//! are published on a broadcast feed so open watches see them.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as Json;
use statecheck_core::{
    CheckConfig, ConfigError, FetchError, FetchResult, Query, Resolve, StatePath, Value,
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::traits::{StateSource, StateValue, ValueStream};

type Leaves = Arc<RwLock<HashMap<StatePath, Json>>>;

#[derive(Debug, Clone)]
struct Update {
    path: StatePath,
    value: Option<Json>,
}

/// State source backed by a map of JSON leaves.
///
/// A JSON `null` is treated the same as an unset leaf.
#[derive(Debug)]
pub struct InMemoryStateSource {
    leaves: Leaves,
    updates: broadcast::Sender<Update>,
    /// When set, every lookup and watch fails with `Unavailable`.
    outage: RwLock<Option<String>>,
    /// Failures handed out to the next lookups, oldest first.
    injected: Mutex<VecDeque<FetchError>>,
    lookups: AtomicUsize,
    watches: AtomicUsize,
}

impl Default for InMemoryStateSource {
    fn default() -> Self {
        Self::with_capacity(statecheck_core::DEFAULT_WATCH_BUFFER)
    }
}

impl InMemoryStateSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source using the config's watch buffer.
    pub fn with_config(config: &CheckConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_capacity(config.watch_buffer))
    }

    fn with_capacity(capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity);
        Self {
            leaves: Arc::new(RwLock::new(HashMap::new())),
            updates,
            outage: RwLock::new(None),
            injected: Mutex::new(VecDeque::new()),
            lookups: AtomicUsize::new(0),
            watches: AtomicUsize::new(0),
        }
    }

    /// Serialize `value` and store it at `path`.
    pub fn set<V: Serialize>(&self, path: &StatePath, value: V) -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(value)?;
        self.set_json(path, json);
        Ok(())
    }

    /// Store a raw JSON leaf at `path`.
    pub fn set_json(&self, path: &StatePath, value: Json) {
        let value = (!value.is_null()).then_some(value);
        // publish under the write lock so watchers see writes in storage order
        let mut leaves = write(&self.leaves);
        match &value {
            Some(json) => leaves.insert(path.clone(), json.clone()),
            None => leaves.remove(path),
        };
        self.publish(path, value);
    }

    /// Unset the leaf at `path`.
    pub fn delete(&self, path: &StatePath) {
        let mut leaves = write(&self.leaves);
        if leaves.remove(path).is_some() {
            self.publish(path, None);
        }
    }

    /// Current raw leaf at `path`, if any.
    pub fn get_json(&self, path: &StatePath) -> Option<Json> {
        read(&self.leaves).get(path).cloned()
    }

    /// Simulate a session outage; `None` restores service.
    pub fn set_unavailable(&self, reason: Option<String>) {
        *self.outage.write().unwrap_or_else(PoisonError::into_inner) = reason;
    }

    /// Make the next lookup fail with `err`.
    pub fn fail_next_lookup(&self, err: FetchError) {
        self.injected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(err);
    }

    /// Number of lookups served (or failed) so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Number of watches opened (or refused) so far.
    pub fn watches(&self) -> usize {
        self.watches.load(Ordering::Relaxed)
    }

    fn publish(&self, path: &StatePath, value: Option<Json>) {
        tracing::trace!(path = %path, present = value.is_some(), "publishing state update");
        // no subscribers is fine
        let _ = self.updates.send(Update {
            path: path.clone(),
            value,
        });
    }

    fn check_available(&self) -> FetchResult<()> {
        let outage = self.outage.read().unwrap_or_else(PoisonError::into_inner);
        match outage.as_ref() {
            Some(reason) => Err(FetchError::unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StateSource for InMemoryStateSource {
    async fn lookup<T: StateValue>(&self, query: &Query<T>) -> FetchResult<Value<T>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let injected = self
            .injected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(err) = injected {
            return Err(err);
        }
        self.check_available()?;

        let path = query.resolve()?;
        let raw = read(&self.leaves).get(&path).cloned();
        tracing::trace!(path = %path, present = raw.is_some(), "lookup");
        decode(&path, raw)
    }

    async fn watch<T: StateValue>(&self, query: &Query<T>) -> FetchResult<ValueStream<T>> {
        self.watches.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        let path = query.resolve()?;

        // Subscribe before reading so no write can fall between the two.
        let rx = self.updates.subscribe();
        let initial = decode::<T>(&path, read(&self.leaves).get(&path).cloned());

        let leaves = Arc::clone(&self.leaves);
        let watched = path.clone();
        let updates = BroadcastStream::new(rx).filter_map(move |item| match item {
            Ok(update) if update.path == watched => Some(decode::<T>(&watched, update.value)),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::debug!(path = %watched, skipped, "watch lagged, re-reading leaf");
                Some(decode::<T>(&watched, read(&leaves).get(&watched).cloned()))
            }
        });

        tracing::debug!(path = %path, "watch opened");
        Ok(Box::pin(tokio_stream::once(initial).chain(updates)))
    }
}

fn decode<T: StateValue>(path: &StatePath, raw: Option<Json>) -> FetchResult<Value<T>> {
    match raw {
        None => Ok(Value::absent(path.clone())),
        Some(json) => {
            let value: T = serde_json::from_value(json)?;
            Ok(Value::present(path.clone(), value))
        }
    }
}

fn read(leaves: &Leaves) -> RwLockReadGuard<'_, HashMap<StatePath, Json>> {
    leaves.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(leaves: &Leaves) -> RwLockWriteGuard<'_, HashMap<StatePath, Json>> {
    leaves.write().unwrap_or_else(PoisonError::into_inner)
}
