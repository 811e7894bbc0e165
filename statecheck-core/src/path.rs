//! Hierarchical state addressing.
//!
//! A [`StatePath`] names one node of the state tree, e.g.
//! `/interfaces/interface[name=Ethernet1/1]/state/oper-status`. A
//! [`Query<T>`] binds a path to the type its value decodes to.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PathError;

static ELEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^\[\]]+)((?:\[[^\[\]]*\])*)$").expect("element pattern is valid")
});

static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\[\]]*)\]").expect("key pattern is valid"));

/// One element of a [`StatePath`]: a name plus optional list keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathElem {
    pub name: String,
    pub keys: BTreeMap<String, String>,
}

impl PathElem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: BTreeMap::new(),
        }
    }

    /// Add a list key, e.g. `name=eth0`.
    pub fn with_key(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.keys.insert(key.into(), value.into());
        self
    }

    fn parse(index: usize, raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::EmptyElement { index });
        }
        let caps = ELEM_RE
            .captures(raw)
            .ok_or_else(|| PathError::MalformedElement {
                element: raw.to_string(),
            })?;

        let mut elem = PathElem::new(&caps[1]);
        for key in KEY_RE.captures_iter(&caps[2]) {
            match key[1].split_once('=') {
                Some((k, v)) if !k.is_empty() => {
                    elem.keys.insert(k.to_string(), v.to_string());
                }
                _ => {
                    return Err(PathError::MalformedKey {
                        element: raw.to_string(),
                        key: key[1].to_string(),
                    })
                }
            }
        }
        Ok(elem)
    }
}

impl fmt::Display for PathElem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (k, v) in &self.keys {
            write!(f, "[{}={}]", k, v)?;
        }
        Ok(())
    }
}

/// Absolute path into the state tree.
///
/// The canonical text form always starts with `/` and renders list keys in
/// sorted order, so two paths that address the same node print identically.
/// Key values may themselves contain `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StatePath {
    elems: Vec<PathElem>,
}

impl StatePath {
    /// The root of the tree, printed as `/`.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_elems(elems: Vec<PathElem>) -> Self {
        Self { elems }
    }

    /// Parse the text form of a path. A leading `/` is optional.
    pub fn parse(s: &str) -> Result<Self, PathError> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        let body = s.strip_prefix('/').unwrap_or(s);
        if body.is_empty() {
            return Ok(Self::root());
        }

        let elems = split_elems(body)?
            .into_iter()
            .enumerate()
            .map(|(i, raw)| PathElem::parse(i, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { elems })
    }

    /// Append an unkeyed element.
    pub fn child(&self, name: impl Into<String>) -> Self {
        self.push(PathElem::new(name))
    }

    /// Append a keyed list element.
    pub fn keyed_child<K, V>(
        &self,
        name: impl Into<String>,
        keys: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let elem = keys
            .into_iter()
            .fold(PathElem::new(name), |elem, (k, v)| elem.with_key(k, v));
        self.push(elem)
    }

    pub fn push(&self, elem: PathElem) -> Self {
        let mut elems = self.elems.clone();
        elems.push(elem);
        Self { elems }
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.elems.split_last()?;
        Some(Self {
            elems: rest.to_vec(),
        })
    }

    pub fn elems(&self) -> &[PathElem] {
        &self.elems
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_root(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn starts_with(&self, prefix: &StatePath) -> bool {
        self.elems.starts_with(&prefix.elems)
    }

    /// Render this path relative to `base`: shared leading elements are
    /// dropped, each remaining base element becomes `..`, and identical
    /// paths render as `.`.
    pub fn relative_to(&self, base: &StatePath) -> String {
        let common = self
            .elems
            .iter()
            .zip(&base.elems)
            .take_while(|(a, b)| a == b)
            .count();

        let mut parts: Vec<String> = std::iter::repeat("..".to_string())
            .take(base.elems.len() - common)
            .collect();
        parts.extend(self.elems[common..].iter().map(ToString::to_string));

        if parts.is_empty() {
            ".".to_string()
        } else {
            parts.join("/")
        }
    }
}

/// Split on `/` outside of `[...]` key blocks.
fn split_elems(body: &str) -> Result<Vec<&str>, PathError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in body.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| PathError::UnbalancedBrackets {
                        element: body[start..].to_string(),
                    })?;
            }
            '/' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(PathError::UnbalancedBrackets {
            element: body[start..].to_string(),
        });
    }
    parts.push(&body[start..]);
    Ok(parts)
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.elems.is_empty() {
            return f.write_str("/");
        }
        for elem in &self.elems {
            write!(f, "/{}", elem)?;
        }
        Ok(())
    }
}

impl FromStr for StatePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StatePath {
    type Error = PathError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<StatePath> for String {
    fn from(path: StatePath) -> Self {
        path.to_string()
    }
}

/// Anything that can be turned into a concrete [`StatePath`].
pub trait Resolve {
    fn resolve(&self) -> Result<StatePath, PathError>;
}

impl Resolve for StatePath {
    fn resolve(&self) -> Result<StatePath, PathError> {
        Ok(self.clone())
    }
}

impl Resolve for str {
    fn resolve(&self) -> Result<StatePath, PathError> {
        StatePath::parse(self)
    }
}

/// A typed address: the path plus the type its value decodes to.
///
/// Construction never fails. A query built from unparsable text keeps the
/// parse error and reports it when it is formatted or fetched.
pub struct Query<T> {
    path: Result<StatePath, PathError>,
    _value: PhantomData<fn() -> T>,
}

impl<T> Query<T> {
    pub fn new(path: StatePath) -> Self {
        Self {
            path: Ok(path),
            _value: PhantomData,
        }
    }

    pub fn parse(path: &str) -> Self {
        Self {
            path: StatePath::parse(path),
            _value: PhantomData,
        }
    }

    /// The resolved path, if resolution succeeded.
    pub fn path(&self) -> Option<&StatePath> {
        self.path.as_ref().ok()
    }
}

impl<T> Resolve for Query<T> {
    fn resolve(&self) -> Result<StatePath, PathError> {
        self.path.clone()
    }
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _value: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("path", &self.path)
            .field("value_type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> From<StatePath> for Query<T> {
    fn from(path: StatePath) -> Self {
        Self::new(path)
    }
}
