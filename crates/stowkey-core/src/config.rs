//! Configuration for Stowkey
//!
//! Example `stowkey.toml`:
//! ```toml
//! access_key_id = "AKIA..."
//! secret_access_key = "..."
//! bucket = "media"
//! region = "eu-west-1"
//! prefix = "prod"
//! ```

use crate::prefix::normalize_prefix;
use crate::types::{CannedAcl, PresignedLimits};
use crate::{Error, Result, DEFAULT_REGION, MAX_PARTS, MIN_PART_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use url::Url;

/// Process-lifetime settings for one bucket
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Access key ID
    #[serde(default)]
    pub access_key_id: String,

    /// Secret access key
    #[serde(default)]
    pub secret_access_key: String,

    /// Bucket name
    #[serde(default)]
    pub bucket: String,

    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,

    /// Environment prefix prepended to every key (`dev`, `prod`, ...)
    #[serde(default)]
    pub prefix: Option<String>,

    /// S3-compatible endpoint; AWS when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Path style access (use path instead of virtual hosted style)
    #[serde(default)]
    pub path_style: bool,

    /// ACL applied when a call does not name one
    #[serde(default)]
    pub default_acl: CannedAcl,

    /// Signed URL lifetime in seconds when a call does not name one
    #[serde(default = "default_expires_in")]
    pub default_expires_in: u64,

    /// Multipart chunk size (bytes)
    #[serde(default = "default_part_size")]
    pub part_size: u64,

    /// Maximum part uploads in flight per upload
    #[serde(default = "default_max_concurrent_parts")]
    pub max_concurrent_parts: usize,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_expires_in() -> u64 {
    PresignedLimits::DEFAULT_EXPIRES
}

fn default_part_size() -> u64 {
    MIN_PART_SIZE
}

fn default_max_concurrent_parts() -> usize {
    4
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            access_key_id: String::new(),
            secret_access_key: String::new(),
            bucket: String::new(),
            region: default_region(),
            prefix: None,
            endpoint: None,
            path_style: false,
            default_acl: CannedAcl::default(),
            default_expires_in: default_expires_in(),
            part_size: default_part_size(),
            max_concurrent_parts: default_max_concurrent_parts(),
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("prefix", &self.prefix)
            .field("endpoint", &self.endpoint)
            .field("path_style", &self.path_style)
            .field("default_acl", &self.default_acl)
            .field("default_expires_in", &self.default_expires_in)
            .field("part_size", &self.part_size)
            .field("max_concurrent_parts", &self.max_concurrent_parts)
            .finish()
    }
}

impl StorageConfig {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        bucket: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            bucket: bucket.into(),
            region: region.into(),
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>, path_style: bool) -> Self {
        self.endpoint = Some(endpoint.into());
        self.path_style = path_style;
        self
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("Failed to read config {:?}: {}", path, e))
        })?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Override fields from `lookup`. `STOWKEY_*` variables win over the
    /// standard `AWS_*` ones.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |names: &[&str]| names.iter().rev().find_map(|name| lookup(name));

        if let Some(v) = var(&["AWS_ACCESS_KEY_ID", "STOWKEY_ACCESS_KEY_ID"]) {
            self.access_key_id = v;
        }
        if let Some(v) = var(&["AWS_SECRET_ACCESS_KEY", "STOWKEY_SECRET_ACCESS_KEY"]) {
            self.secret_access_key = v;
        }
        if let Some(v) = var(&["AWS_REGION", "STOWKEY_REGION"]) {
            self.region = v;
        }
        if let Some(v) = var(&["AWS_ENDPOINT_URL", "STOWKEY_ENDPOINT"]) {
            self.endpoint = Some(v);
        }
        if let Some(v) = var(&["STOWKEY_BUCKET"]) {
            self.bucket = v;
        }
        if let Some(v) = var(&["STOWKEY_PREFIX"]) {
            self.prefix = Some(v);
        }
        if let Some(v) = var(&["STOWKEY_PATH_STYLE"]) {
            self.path_style = parse_env("STOWKEY_PATH_STYLE", &v)?;
        }
        if let Some(v) = var(&["STOWKEY_DEFAULT_ACL"]) {
            self.default_acl = v.parse().map_err(Error::InvalidConfig)?;
        }
        if let Some(v) = var(&["STOWKEY_DEFAULT_EXPIRES_IN"]) {
            self.default_expires_in = parse_env("STOWKEY_DEFAULT_EXPIRES_IN", &v)?;
        }
        if let Some(v) = var(&["STOWKEY_PART_SIZE"]) {
            self.part_size = parse_env("STOWKEY_PART_SIZE", &v)?;
        }
        if let Some(v) = var(&["STOWKEY_MAX_CONCURRENT_PARTS"]) {
            self.max_concurrent_parts = parse_env("STOWKEY_MAX_CONCURRENT_PARTS", &v)?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(Error::InvalidConfig("bucket not configured".into()));
        }
        if self.region.trim().is_empty() {
            return Err(Error::InvalidConfig("region not configured".into()));
        }
        if self.access_key_id.is_empty() || self.secret_access_key.is_empty() {
            return Err(Error::InvalidConfig(
                "credentials not configured (access_key_id / secret_access_key)".into(),
            ));
        }
        if self.part_size < MIN_PART_SIZE {
            return Err(Error::InvalidConfig(format!(
                "part_size must be at least {} bytes, got {}",
                MIN_PART_SIZE, self.part_size
            )));
        }
        if self.max_concurrent_parts == 0 {
            return Err(Error::InvalidConfig(
                "max_concurrent_parts must be positive".into(),
            ));
        }
        PresignedLimits::validate_expires(self.default_expires_in)
            .map_err(|e| Error::InvalidConfig(format!("default_expires_in: {}", e)))?;

        if let Some(prefix) = &self.prefix {
            normalize_prefix(prefix)?;
        }
        self.base_url()?;

        Ok(())
    }

    /// Largest object a multipart upload can carry with this part size
    pub fn max_upload_size(&self) -> u64 {
        self.part_size.saturating_mul(MAX_PARTS as u64)
    }

    /// Bucket URL without prefix or trailing slash
    pub fn base_url(&self) -> Result<String> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(format!(
                "https://{}.s3.{}.amazonaws.com",
                self.bucket, self.region
            ));
        };

        let url = Url::parse(endpoint)
            .map_err(|e| Error::InvalidConfig(format!("Invalid endpoint {}: {}", endpoint, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidConfig(format!("No host in endpoint: {}", endpoint)))?;

        if self.path_style {
            return Ok(format!(
                "{}/{}",
                endpoint.trim_end_matches('/'),
                self.bucket
            ));
        }

        Ok(match url.port() {
            Some(port) => format!("{}://{}.{}:{}", url.scheme(), self.bucket, host, port),
            None => format!("{}://{}.{}", url.scheme(), self.bucket, host),
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("Invalid value for {}: {}", name, value)))
}
