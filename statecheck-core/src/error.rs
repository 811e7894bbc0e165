//! Error types for statecheck operations

use std::fmt;
use thiserror::Error;

use crate::format::format_path;
use crate::path::{Resolve, StatePath};

/// Path parsing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path")]
    Empty,

    #[error("empty element at index {index}")]
    EmptyElement { index: usize },

    #[error("unbalanced brackets in element {element:?}")]
    UnbalancedBrackets { element: String },

    #[error("malformed element {element:?}")]
    MalformedElement { element: String },

    #[error("malformed key {key:?} in element {element:?}, want name=value")]
    MalformedKey { element: String, key: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Why a state source could not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// The wait budget ran out.
    DeadlineExceeded,
    /// The caller cancelled the wait.
    Cancelled,
    /// The session or transport is down.
    Unavailable,
    /// The query's path could not be resolved.
    InvalidPath,
    /// A value arrived but could not be decoded into the query's type.
    Decode,
    /// A watch stream ended without an error.
    StreamClosed,
    Internal,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DeadlineExceeded => "deadline exceeded",
            Self::Cancelled => "cancelled",
            Self::Unavailable => "unavailable",
            Self::InvalidPath => "invalid path",
            Self::Decode => "decode failed",
            Self::StreamClosed => "stream closed",
            Self::Internal => "internal error",
        };
        f.write_str(s)
    }
}

/// Transport-level failure raised by a lookup or a watch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn deadline_exceeded() -> Self {
        Self::new(FetchErrorKind::DeadlineExceeded, "context deadline reached")
    }

    pub fn cancelled() -> Self {
        Self::new(FetchErrorKind::Cancelled, "wait cancelled by caller")
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Unavailable, message)
    }

    pub fn stream_closed() -> Self {
        Self::new(FetchErrorKind::StreamClosed, "watch stream ended")
    }

    pub fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// True only for a deadline-exceeded failure; other transport failures,
    /// including cancellation, are not timeouts.
    pub fn is_timeout(&self) -> bool {
        self.kind == FetchErrorKind::DeadlineExceeded
    }
}

impl From<PathError> for FetchError {
    fn from(err: PathError) -> Self {
        Self::new(FetchErrorKind::InvalidPath, err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(FetchErrorKind::Decode, err.to_string())
    }
}

/// Result type alias for state source operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// A value was fetched but did not satisfy the validation function.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct Mismatch {
    message: String,
}

impl Mismatch {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for Mismatch {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for Mismatch {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Coarse classification of a [`ValidationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No value could be obtained, or the wait ended before a passing one.
    Transport,
    /// A value was obtained and it was wrong.
    Validation,
    /// Neither cause recorded.
    Unknown,
}

/// Failure of a check or an await against one path.
///
/// A failed check carries exactly one cause. A failed await always carries
/// the `failure_cause` that ended the wait and, when a value was seen, the
/// last mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    query: Result<StatePath, PathError>,
    path: String,
    validation_err: Option<Mismatch>,
    failure_cause: Option<FetchError>,
}

impl ValidationError {
    /// Build an error for `query`, which may be a [`Query`](crate::Query),
    /// a [`StatePath`] or path text.
    pub fn new<P: Resolve + ?Sized>(
        query: &P,
        validation_err: Option<Mismatch>,
        failure_cause: Option<FetchError>,
    ) -> Self {
        Self {
            query: query.resolve(),
            path: format_path(Some(query)),
            validation_err,
            failure_cause,
        }
    }

    /// The value could not be fetched.
    pub fn fetch_failed<P: Resolve + ?Sized>(query: &P, cause: FetchError) -> Self {
        Self::new(query, None, Some(cause))
    }

    /// The value was fetched and rejected.
    pub fn mismatch<P: Resolve + ?Sized>(query: &P, mismatch: Mismatch) -> Self {
        Self::new(query, Some(mismatch), None)
    }

    /// A wait ended without a passing value.
    pub fn wait_ended<P: Resolve + ?Sized>(
        query: &P,
        cause: FetchError,
        last_mismatch: Option<Mismatch>,
    ) -> Self {
        Self::new(query, last_mismatch, Some(cause))
    }

    /// The originating address, or why it could not be resolved.
    pub fn query(&self) -> Result<&StatePath, &PathError> {
        self.query.as_ref()
    }

    /// The address as rendered in the message.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn validation_err(&self) -> Option<&Mismatch> {
        self.validation_err.as_ref()
    }

    pub fn failure_cause(&self) -> Option<&FetchError> {
        self.failure_cause.as_ref()
    }

    pub fn kind(&self) -> FailureKind {
        match (&self.failure_cause, &self.validation_err) {
            (Some(_), _) => FailureKind::Transport,
            (None, Some(_)) => FailureKind::Validation,
            (None, None) => FailureKind::Unknown,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.failure_cause
            .as_ref()
            .is_some_and(FetchError::is_timeout)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = &self.path;
        match (&self.failure_cause, &self.validation_err) {
            (Some(cause), Some(mismatch)) if cause.is_timeout() => {
                write!(f, "{}: {} (deadline exceeded)", path, mismatch)
            }
            (Some(cause), None) if cause.is_timeout() => {
                write!(f, "{}: deadline exceeded before any values were fetched", path)
            }
            // transport failures win over a stale mismatch
            (Some(cause), _) => write!(f, "{}: {}", path, cause),
            (None, Some(mismatch)) => write!(f, "{}: {}", path, mismatch),
            (None, None) => write!(f, "{}: unknown error", path),
        }
    }
}

impl std::error::Error for ValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match (&self.failure_cause, &self.validation_err) {
            (Some(cause), _) => Some(cause),
            (None, Some(mismatch)) => Some(mismatch),
            (None, None) => None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    const PATH: &str = "/system/state/hostname";

    #[test]
    fn test_timeout_with_mismatch() {
        let err = ValidationError::wait_ended(
            PATH,
            FetchError::deadline_exceeded(),
            Some(Mismatch::new("got 4, want 5")),
        );
        assert_eq!(
            err.to_string(),
            "/system/state/hostname: got 4, want 5 (deadline exceeded)"
        );
        assert!(err.is_timeout());
        assert_eq!(err.kind(), FailureKind::Transport);
    }

    #[test]
    fn test_timeout_without_values() {
        let err = ValidationError::wait_ended(PATH, FetchError::deadline_exceeded(), None);
        assert_eq!(
            err.to_string(),
            "/system/state/hostname: deadline exceeded before any values were fetched"
        );
    }

    #[test]
    fn test_transport_failure_hides_mismatch() {
        let err = ValidationError::wait_ended(
            PATH,
            FetchError::unavailable("connection reset"),
            Some(Mismatch::new("got 4, want 5")),
        );
        let msg = err.to_string();
        assert_eq!(msg, "/system/state/hostname: unavailable: connection reset");
        assert!(!msg.contains("got 4"));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_cancellation_is_not_timeout() {
        let err = ValidationError::wait_ended(
            PATH,
            FetchError::cancelled(),
            Some(Mismatch::new("got 4, want 5")),
        );
        assert!(!err.is_timeout());
        assert_eq!(
            err.to_string(),
            "/system/state/hostname: cancelled: wait cancelled by caller"
        );
    }

    #[test]
    fn test_mismatch_only() {
        let err = ValidationError::mismatch(PATH, Mismatch::new("got \"a\", want \"b\""));
        assert_eq!(err.to_string(), "/system/state/hostname: got \"a\", want \"b\"");
        assert_eq!(err.kind(), FailureKind::Validation);
        assert!(err.failure_cause().is_none());
    }

    #[test]
    fn test_unknown_error() {
        let err = ValidationError::new(PATH, None, None);
        assert_eq!(err.to_string(), "/system/state/hostname: unknown error");
        assert_eq!(err.kind(), FailureKind::Unknown);
        assert!(err.source().is_none());
    }

    #[test]
    fn test_source_prefers_failure_cause() {
        let err = ValidationError::wait_ended(
            PATH,
            FetchError::stream_closed(),
            Some(Mismatch::new("got 1, want 2")),
        );
        let source = err.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("stream closed: watch stream ended"));
    }

    #[test]
    fn test_error_keeps_originating_address() {
        let path = StatePath::parse(PATH).unwrap();
        let err = ValidationError::mismatch(&path, Mismatch::new("got 1, want 2"));
        assert_eq!(err.query(), Ok(&path));
        assert_eq!(err.path(), PATH);

        let err = ValidationError::fetch_failed("/a/b[c]", FetchError::unavailable("down"));
        assert!(matches!(err.query(), Err(PathError::MalformedKey { .. })));
        assert!(err.path().starts_with("<unprintable path: "));
    }

    #[test]
    fn test_fetch_error_conversions() {
        let from_path = FetchError::from(PathError::Empty);
        assert_eq!(from_path.kind(), FetchErrorKind::InvalidPath);
        assert_eq!(from_path.message(), "empty path");

        let json_err = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        let from_json = FetchError::from(json_err);
        assert_eq!(from_json.kind(), FetchErrorKind::Decode);
        assert!(!from_json.is_timeout());
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "watch_buffer".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("watch_buffer"));
        assert!(msg.contains("must be positive"));
    }
}
