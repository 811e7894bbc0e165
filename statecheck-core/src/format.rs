//! Diagnostic rendering of paths and values.
//!
//! None of these functions fail: broken inputs render as placeholders so an
//! error message can always be built.

use std::fmt::Debug;

use crate::path::Resolve;
use crate::value::Value;

/// Rendered in place of a missing query.
pub const NIL_PATH: &str = "<nil path>";

/// Format a query's path, or a placeholder if it is missing or unresolvable.
pub fn format_path<P: Resolve + ?Sized>(path: Option<&P>) -> String {
    match path.map(|p| p.resolve()) {
        None => NIL_PATH.to_string(),
        Some(Ok(resolved)) => resolved.to_string(),
        Some(Err(err)) => format!("<unprintable path: {}>", err),
    }
}

/// Format a fetched value: `nil` if there is no wrapper at all, `no value`
/// if the node is unset, otherwise the value's `Debug` form.
pub fn format_value<T: Debug>(value: Option<&Value<T>>) -> String {
    match value {
        None => "nil".to_string(),
        Some(v) => match v.val() {
            None => "no value".to_string(),
            Some(val) => format!("{:?}", val),
        },
    }
}

/// Format `path` relative to `base`, falling back to the absolute form when
/// either side cannot be resolved.
pub fn format_relative_path<B, P>(base: Option<&B>, path: Option<&P>) -> String
where
    B: Resolve + ?Sized,
    P: Resolve + ?Sized,
{
    let base = base.and_then(|b| b.resolve().ok());
    let target = path.and_then(|p| p.resolve().ok());
    match (base, target) {
        (Some(base), Some(target)) => target.relative_to(&base),
        _ => format_path(path),
    }
}
