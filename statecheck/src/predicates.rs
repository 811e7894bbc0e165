//! Validator constructors for common expectations.
//!
//! Each returns a [`Validation`] whose failures read `got <value>, <want>`,
//! for example:
//!
//! ```text
//! /system/state/hostname: got "wrongname", want "node1" or no value
//! /interfaces/interface[name=eth0]/state/mtu: got 1500, want 9000
//! /some/other/path: got 100, want no value
//! ```

use std::cmp::Ordering;

use statecheck_core::{format_value, Mismatch, Query, Value};
use statecheck_source::StateValue;

use crate::validator::Validation;

/// Validate with an arbitrary function of the fetched value.
pub fn validate<T, F>(query: impl Into<Query<T>>, validation_fn: F) -> Validation<T>
where
    T: StateValue,
    F: Fn(&Value<T>) -> Result<(), Mismatch> + Send + Sync + 'static,
{
    Validation::new(query.into(), validation_fn)
}

/// Expect a value that satisfies `predicate`.
///
/// An absent value always fails and `predicate` is never called on it.
/// `want_msg` completes the error, e.g. `"want a multiple of 4"` gives
/// `got 13, want a multiple of 4`.
pub fn predicate<T, F>(query: impl Into<Query<T>>, want_msg: impl Into<String>, predicate: F) -> Validation<T>
where
    T: StateValue,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    let want_msg = want_msg.into();
    validate(query, move |got: &Value<T>| match got.val() {
        Some(v) if predicate(v) => Ok(()),
        _ => Err(Mismatch::new(format!(
            "got {}, {}",
            format_value(Some(got)),
            want_msg
        ))),
    })
}

/// Expect the value to equal `want`.
pub fn equal<T>(query: impl Into<Query<T>>, want: T) -> Validation<T>
where
    T: StateValue + PartialEq,
{
    let want_msg = format!("want {:?}", want);
    predicate(query, want_msg, move |got: &T| *got == want)
}

/// Expect a value other than `want_not`. An absent value also fails.
pub fn not_equal<T>(query: impl Into<Query<T>>, want_not: T) -> Validation<T>
where
    T: StateValue + PartialEq,
{
    let want_msg = format!("want anything but {:?}", want_not);
    predicate(query, want_msg, move |got: &T| *got != want_not)
}

/// Expect the value to be unset or equal to `want`.
pub fn equal_or_nil<T>(query: impl Into<Query<T>>, want: T) -> Validation<T>
where
    T: StateValue + PartialEq,
{
    validate(query, move |got: &Value<T>| match got.val() {
        Some(v) if *v != want => Err(Mismatch::new(format!(
            "got {}, want {:?} or no value",
            format_value(Some(got)),
            want
        ))),
        _ => Ok(()),
    })
}

/// Expect any value at all.
pub fn present<T>(query: impl Into<Query<T>>) -> Validation<T>
where
    T: StateValue,
{
    predicate(query, "want any value", |_: &T| true)
}

/// Expect the node to be unset.
pub fn not_present<T>(query: impl Into<Query<T>>) -> Validation<T>
where
    T: StateValue,
{
    validate(query, |got: &Value<T>| {
        if got.is_present() {
            return Err(Mismatch::new(format!(
                "got {}, want no value",
                format_value(Some(got))
            )));
        }
        Ok(())
    })
}

/// Expect a sequence holding the same elements as `want`, in any order.
///
/// Both sides are sorted with `compare` before an element-wise comparison,
/// so `compare` must be a total order over the fields equality looks at.
pub fn unordered_equal<T, F>(query: impl Into<Query<Vec<T>>>, want: Vec<T>, compare: F) -> Validation<Vec<T>>
where
    T: StateValue + PartialEq,
    F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
{
    let want_msg = format!("want {:?}", want);
    let mut sorted_want = want;
    sorted_want.sort_by(&compare);

    predicate(query, want_msg, move |got: &Vec<T>| {
        if got.len() != sorted_want.len() {
            return false;
        }
        let mut sorted_got: Vec<&T> = got.iter().collect();
        sorted_got.sort_by(|a, b| compare(a, b));
        sorted_got.into_iter().zip(&sorted_want).all(|(g, w)| g == w)
    })
}

/// [`unordered_equal`] using the element type's own ordering.
pub fn unordered_eq<T>(query: impl Into<Query<Vec<T>>>, want: Vec<T>) -> Validation<Vec<T>>
where
    T: StateValue + Ord,
{
    unordered_equal(query, want, T::cmp)
}
