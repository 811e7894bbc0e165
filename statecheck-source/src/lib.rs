//! State sources for statecheck.
//!
//! [`StateSource`] is the boundary between the validator core and whatever
//! owns the state: it offers a one-shot [`lookup`](StateSource::lookup) and
//! a continuous [`watch`](StateSource::watch). [`InMemoryStateSource`] is a
//! complete implementation over JSON leaves, used by tests and demos.
//!
//! # Example
//!
//! ```ignore
//! let source = InMemoryStateSource::new();
//! let path = StatePath::parse("/system/state/hostname")?;
//! source.set(&path, "node1")?;
//!
//! let value = source.lookup(&Query::<String>::new(path)).await?;
//! assert_eq!(value.val().map(String::as_str), Some("node1"));
//! ```

pub mod memory;
pub mod traits;

pub use memory::InMemoryStateSource;
pub use traits::{StateSource, StateValue, ValueStream};
