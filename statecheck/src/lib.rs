//! statecheck
//!
//! Declare what a path in a device's state tree should hold, then check it
//! once or wait for it to converge:
//!
//! ```ignore
//! use statecheck::{equal, AwaitContext, StatePath, Validator};
//!
//! let mtu = StatePath::parse("/interfaces/interface[name=eth0]/state/mtu")?;
//! let vd = equal(mtu, 9000u32);
//!
//! vd.check(&source).await?;                                  // one fetch
//! vd.await_for(Duration::from_secs(30), &source).await?;     // poll + watch
//! vd.await_until(Utc::now() + chrono::Duration::seconds(30), &source).await?;
//! ```
//!
//! Failures are [`ValidationError`]s whose message names the path, the last
//! mismatch and, when the wait ran out, `(deadline exceeded)`.

pub mod context;
pub mod predicates;
pub mod suite;
pub mod validator;

pub use context::{AwaitContext, CancelHandle};
pub use predicates::{
    equal, equal_or_nil, not_equal, not_present, predicate, present, unordered_eq,
    unordered_equal, validate,
};
pub use suite::{SuiteOutcome, SuiteReport, SuiteSummary, ValidatorSuite};
pub use validator::{Validation, ValidationFn, Validator};

pub use statecheck_core::{
    format_path, format_relative_path, format_value, CheckConfig, FailureKind, FetchError,
    FetchErrorKind, FetchResult, Mismatch, PathElem, PathError, Query, Resolve, StatePath,
    ValidationError, Value, NIL_PATH,
};
pub use statecheck_source::{InMemoryStateSource, StateSource, StateValue, ValueStream};
