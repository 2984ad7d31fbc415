//! Pre-signed URL types for temporary access
//!
//! A `get` URL lets its holder download one object; a `put` URL lets its
//! holder upload to one key, with the ACL and content type bound into the
//! signature so the upload must send exactly those values.

use crate::key::ResolvedKey;
use crate::types::CannedAcl;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Operations a signed URL can grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignOperation {
    /// Download the object
    #[default]
    Get,
    /// Upload the object
    Put,
}

impl SignOperation {
    /// HTTP method the signed URL must be used with
    pub fn method(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
        }
    }
}

impl std::fmt::Display for SignOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "get"),
            Self::Put => write!(f, "put"),
        }
    }
}

impl std::str::FromStr for SignOperation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "put" => Ok(Self::Put),
            _ => Err(format!("Invalid operation: {}. Use get or put.", s)),
        }
    }
}

/// Caller-facing options for a signed URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignOptions {
    /// Lifetime in seconds; `None` or `0` means the default
    pub expires_in: Option<u64>,
    /// ACL bound into `put` URLs; the configured default when `None`
    pub acl: Option<CannedAcl>,
    /// Content type bound into `put` URLs
    pub content_type: Option<String>,
}

impl SignOptions {
    pub fn expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    pub fn acl(mut self, acl: CannedAcl) -> Self {
        self.acl = Some(acl);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Fully resolved signing request handed to a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignRequest {
    pub key: ResolvedKey,
    pub operation: SignOperation,
    pub expires_in: Duration,
    /// Only set for `put`
    pub acl: Option<CannedAcl>,
    /// Only set for `put`
    pub content_type: Option<String>,
}

/// Pre-signed URL response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrl {
    /// The complete pre-signed URL
    pub url: String,
    /// HTTP method
    pub method: String,
    /// Expiration time
    pub expires_at: DateTime<Utc>,
    /// Signed headers the request must carry verbatim (for PUT)
    pub headers: Vec<(String, String)>,
}

impl SignedUrl {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn into_url(self) -> String {
        self.url
    }
}

/// Limits for pre-signed URLs
pub struct PresignedLimits;

impl PresignedLimits {
    /// Maximum expiration time (7 days)
    pub const MAX_EXPIRES: u64 = 7 * 24 * 60 * 60;

    /// Default expiration time (5 minutes)
    pub const DEFAULT_EXPIRES: u64 = 5 * 60;

    /// Resolve a requested lifetime: absent or zero falls back to `default`
    pub fn resolve_expires(requested: Option<u64>, default: u64) -> Result<u64> {
        let seconds = match requested {
            Some(s) if s > 0 => s,
            _ => default,
        };
        Self::validate_expires(seconds)
    }

    /// Validate expiration time
    pub fn validate_expires(seconds: u64) -> Result<u64> {
        if seconds == 0 {
            Err(Error::InvalidArgument(
                "Expiration must be at least 1 second".into(),
            ))
        } else if seconds > Self::MAX_EXPIRES {
            Err(Error::InvalidArgument(format!(
                "Expiration cannot exceed {} seconds (7 days)",
                Self::MAX_EXPIRES
            )))
        } else {
            Ok(seconds)
        }
    }
}
