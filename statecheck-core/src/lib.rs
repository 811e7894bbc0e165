//! statecheck core types
//!
//! Pure data and formatting, no I/O. Every other crate in the workspace
//! depends on this one:
//!
//! - [`StatePath`] and [`Query<T>`]: typed addresses into a state tree
//! - [`Value<T>`]: a fetched, possibly absent, value
//! - [`ValidationError`], [`FetchError`], [`Mismatch`]: the failure model
//! - [`format_path`], [`format_value`], [`format_relative_path`]: diagnostics
//! - [`CheckConfig`]: shared settings

pub mod config;
pub mod error;
pub mod format;
pub mod path;
pub mod value;

pub use config::{CheckConfig, DEFAULT_TIMEOUT_MS, DEFAULT_WATCH_BUFFER};
pub use error::{
    ConfigError, FailureKind, FetchError, FetchErrorKind, FetchResult, Mismatch, PathError,
    ValidationError,
};
pub use format::{format_path, format_relative_path, format_value, NIL_PATH};
pub use path::{PathElem, Query, Resolve, StatePath};
pub use value::Value;
