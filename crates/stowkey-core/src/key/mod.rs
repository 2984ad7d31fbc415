//! Object key construction
//!
//! Keys are absolute, `/`-separated paths. Untrusted fragments go through
//! [`sanitize`] before they become a segment, [`KeyBuilder`] composes them
//! into a hierarchy, and [`crate::PrefixResolver`] turns an [`ObjectKey`]
//! into the [`ResolvedKey`] that the store operates on.

mod builder;
mod object_key;
mod sanitize;

pub use builder::KeyBuilder;
pub use object_key::{unique_key, ObjectKey, ResolvedKey, SEPARATOR};
pub use sanitize::sanitize;
