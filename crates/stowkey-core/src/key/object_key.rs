//! Absolute object key newtypes

use crate::key::sanitize;
use crate::utils::extension;
use crate::{Error, Result, MAX_KEY_LENGTH};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Key path separator
pub const SEPARATOR: char = '/';

/// An absolute key as handed in by a caller, before any prefix is applied.
///
/// Always starts with exactly one `/` and never contains empty segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Parse an absolute key, collapsing repeated separators
    pub fn parse(key: &str) -> Result<Self> {
        normalize(key).map(Self)
    }

    /// Build a key from a folder and a name below it.
    ///
    /// `folder` may be `/` (bucket root), relative or absolute; `name` may
    /// contain further separators.
    pub fn join(folder: &str, name: &str) -> Result<Self> {
        normalize(&format!("{SEPARATOR}{folder}{SEPARATOR}{name}")).map(Self)
    }

    /// Assemble a key from segments that are already free of separators
    pub(crate) fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut key = String::new();
        for segment in segments {
            let segment = segment.as_ref();
            if segment.is_empty() || is_relative_segment(segment) {
                continue;
            }
            key.push(SEPARATOR);
            key.push_str(segment);
        }
        if key.is_empty() {
            key.push(SEPARATOR);
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate the path segments (without separators)
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Last segment of the key
    pub fn file_name(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or("")
    }

    /// Extension of the last segment including the dot, or `""`
    pub fn extension(&self) -> &str {
        extension(self.file_name())
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ObjectKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.0
    }
}

/// A key with the environment prefix already applied.
///
/// Obtained from [`crate::PrefixResolver::add_prefix`], or from a key that was
/// persisted after an earlier upload via [`ResolvedKey::from_stored`]. A
/// resolved key is never prefixed again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResolvedKey(String);

impl ResolvedKey {
    pub(crate) fn new(key: String) -> Self {
        Self(key)
    }

    /// Accept a key previously returned by this layer (e.g. read from a database)
    pub fn from_stored(key: &str) -> Result<Self> {
        normalize(key).map(Self)
    }

    /// Rebuild a resolved key from an object name as the store reports it
    pub fn from_backend_key(key: &str) -> Result<Self> {
        normalize(&format!("{SEPARATOR}{key}")).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The object name sent to the store: the key without its leading `/`
    pub fn to_backend_key(&self) -> &str {
        self.0.strip_prefix(SEPARATOR).unwrap_or(&self.0)
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or("")
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ResolvedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResolvedKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResolvedKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_stored(&value)
    }
}

impl From<ResolvedKey> for String {
    fn from(key: ResolvedKey) -> Self {
        key.0
    }
}

/// A root-level key with a random name that keeps the extension of `filename`
pub fn unique_key(filename: &str) -> ObjectKey {
    let filename = sanitize(filename);
    ObjectKey::from_segments([unique_leaf(extension(&filename))])
}

pub(crate) fn unique_leaf(extension: &str) -> String {
    format!("{}{}", Uuid::new_v4(), extension)
}

fn is_relative_segment(segment: &str) -> bool {
    segment == "." || segment == ".."
}

fn normalize(key: &str) -> Result<String> {
    if key.is_empty() {
        return Err(Error::InvalidKey("key must not be empty".into()));
    }
    if !key.starts_with(SEPARATOR) {
        return Err(Error::InvalidKey(format!(
            "key must be an absolute path starting with '/': {}",
            key
        )));
    }

    let mut normalized = String::with_capacity(key.len());
    for segment in key.split(SEPARATOR).filter(|s| !s.is_empty()) {
        // `.` and `..` are rejected, never resolved
        if is_relative_segment(segment) {
            return Err(Error::InvalidKey(format!(
                "relative segments are not allowed: {}",
                key
            )));
        }
        normalized.push(SEPARATOR);
        normalized.push_str(segment);
    }
    if key.ends_with(SEPARATOR) && !normalized.is_empty() {
        normalized.push(SEPARATOR);
    }

    if normalized.is_empty() {
        return Err(Error::InvalidKey("key must name an object, not the root".into()));
    }
    if normalized.len() > MAX_KEY_LENGTH {
        return Err(Error::InvalidKey(format!(
            "key exceeds {} bytes",
            MAX_KEY_LENGTH
        )));
    }

    Ok(normalized)
}
