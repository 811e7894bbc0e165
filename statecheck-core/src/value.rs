//! Observed values.
//!
//! Every fetch produces a fresh [`Value<T>`]: the decoded leaf if the node
//! was set, plus where and when it was observed.

use chrono::{DateTime, Utc};

use crate::path::StatePath;

/// An optional value observed at a path.
#[derive(Debug, Clone)]
pub struct Value<T> {
    /// The decoded value, `None` when the node is unset.
    value: Option<T>,
    /// The path the value was observed at.
    path: StatePath,
    /// When the value was received.
    received_at: DateTime<Utc>,
}

impl<T> Value<T> {
    /// A value that is set.
    pub fn present(path: StatePath, value: T) -> Self {
        Self {
            value: Some(value),
            path,
            received_at: Utc::now(),
        }
    }

    /// A node that has no value.
    pub fn absent(path: StatePath) -> Self {
        Self {
            value: None,
            path,
            received_at: Utc::now(),
        }
    }

    pub fn from_option(path: StatePath, value: Option<T>) -> Self {
        Self {
            value,
            path,
            received_at: Utc::now(),
        }
    }

    /// Override the receive timestamp.
    pub fn with_timestamp(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    pub fn val(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    pub fn path(&self) -> &StatePath {
        &self.path
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn into_inner(self) -> Option<T> {
        self.value
    }

    pub fn map<U, F>(self, f: F) -> Value<U>
    where
        F: FnOnce(T) -> U,
    {
        Value {
            value: self.value.map(f),
            path: self.path,
            received_at: self.received_at,
        }
    }
}
