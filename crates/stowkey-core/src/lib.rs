//! Stowkey Core Library
//!
//! Key construction, prefixing and the shared types used by the Stowkey
//! object storage layer. Nothing in this crate performs I/O against a store.

pub mod config;
pub mod error;
pub mod key;
pub mod prefix;
pub mod types;
pub mod utils;

pub use config::StorageConfig;
pub use error::{Error, Result};
pub use key::{sanitize, unique_key, KeyBuilder, ObjectKey, ResolvedKey};
pub use prefix::PrefixResolver;

/// Stowkey version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default S3 region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Maximum number of parts in multipart upload
pub const MAX_PARTS: u32 = 10_000;

/// Minimum part size accepted by S3 for all but the last part (5 MiB)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum object key length
pub const MAX_KEY_LENGTH: usize = 1024;

/// Content type used when nothing better is known
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
