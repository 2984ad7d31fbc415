//! Environment prefix handling and public URL rendering
//!
//! The prefix (`/dev`, `/prod`, ...) is applied per call by
//! [`PrefixResolver::add_prefix`]. The base URL never contains it, so a URL is
//! always `base_url + resolved_key` and the prefix appears exactly once.

use crate::config::StorageConfig;
use crate::key::{ObjectKey, ResolvedKey, SEPARATOR};
use crate::{Error, Result, MAX_KEY_LENGTH};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixResolver {
    prefix: Option<String>,
    base_url: String,
}

impl PrefixResolver {
    pub fn new(prefix: Option<&str>, base_url: &str) -> Result<Self> {
        let prefix = match prefix {
            Some(p) => normalize_prefix(p)?,
            None => None,
        };

        Ok(Self {
            prefix,
            base_url: base_url.trim_end_matches(SEPARATOR).to_string(),
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::new(config.prefix.as_deref(), &config.base_url()?)
    }

    /// Normalized prefix (`/prod`), if one is configured
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Validate `key` as an absolute path and prepend the prefix
    pub fn add_prefix(&self, key: &str) -> Result<ResolvedKey> {
        self.resolve(&ObjectKey::parse(key)?)
    }

    /// Prepend the prefix to an already validated key.
    ///
    /// The key length limit applies to the prefixed key.
    pub fn resolve(&self, key: &ObjectKey) -> Result<ResolvedKey> {
        let resolved = match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, key.as_str()),
            None => key.as_str().to_string(),
        };
        if resolved.len() > MAX_KEY_LENGTH {
            return Err(Error::InvalidKey(format!(
                "key exceeds {} bytes once prefixed: {}",
                MAX_KEY_LENGTH, resolved
            )));
        }
        Ok(ResolvedKey::new(resolved))
    }

    /// Remove the prefix again, e.g. for keys reported back by the store
    pub fn strip_prefix(&self, key: &ResolvedKey) -> Option<ObjectKey> {
        let rest = match &self.prefix {
            Some(prefix) => key.as_str().strip_prefix(prefix.as_str())?,
            None => key.as_str(),
        };
        if !rest.starts_with(SEPARATOR) {
            return None;
        }
        ObjectKey::parse(rest).ok()
    }

    /// Public URL of `key` after prefixing
    pub fn resolve_url(&self, key: &ObjectKey) -> Result<String> {
        Ok(self.url_for(&self.resolve(key)?))
    }

    /// Public URL of an already resolved key
    pub fn url_for(&self, key: &ResolvedKey) -> String {
        format!("{}{}", self.base_url, key.as_str())
    }
}

/// Normalize a configured prefix to `/a/b` form, `None` when empty.
pub fn normalize_prefix(prefix: &str) -> Result<Option<String>> {
    let prefix = prefix.trim();

    if prefix.contains('\\') {
        return Err(Error::InvalidConfig(format!(
            "prefix must not contain '\\': {}",
            prefix
        )));
    }

    let mut normalized = String::new();
    for segment in prefix.split(SEPARATOR).filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(Error::InvalidConfig(format!(
                "prefix must not contain relative segments: {}",
                prefix
            )));
        }
        if segment.trim().is_empty() {
            return Err(Error::InvalidConfig(format!(
                "prefix contains a blank segment: {:?}",
                prefix
            )));
        }
        normalized.push(SEPARATOR);
        normalized.push_str(segment);
    }

    Ok(if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    })
}
