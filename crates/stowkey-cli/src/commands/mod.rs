//! CLI command implementations

pub mod configure;
pub mod get;
pub mod info;
pub mod key;
pub mod presign;
pub mod rm;
pub mod upload;
pub mod url;

use crate::OutputFormat;
use anyhow::{Context, Result};
use stowkey_core::{PrefixResolver, ResolvedKey, StorageConfig};
use stowkey_storage::ObjectStore;

/// Context passed to all commands
pub struct CommandContext {
    pub config: StorageConfig,
    pub output_format: OutputFormat,
    pub verbose: bool,
    pub quiet: bool,
}

impl CommandContext {
    /// Check if output should be JSON
    pub fn is_json(&self) -> bool {
        matches!(self.output_format, OutputFormat::Json)
    }

    /// Print info message if not quiet
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Print verbose message if verbose mode
    pub fn debug(&self, msg: &str) {
        if self.verbose {
            tracing::debug!("{}", msg);
        }
    }

    /// Resolver for commands that never reach the store
    pub fn resolver(&self) -> Result<PrefixResolver> {
        PrefixResolver::from_config(&self.config).context("Invalid bucket configuration")
    }

    pub fn store(&self) -> Result<ObjectStore> {
        ObjectStore::new(self.config.clone()).context(
            "Storage not configured. Set STOWKEY_BUCKET and credentials or use 'stowkey configure'",
        )
    }

    /// `stored` keys were returned by an earlier upload and already carry the
    /// prefix; anything else is prefixed here
    pub fn resolve_key(&self, resolver: &PrefixResolver, key: &str, stored: bool) -> Result<ResolvedKey> {
        let resolved = if stored {
            ResolvedKey::from_stored(key)?
        } else {
            resolver.add_prefix(key)?
        };
        self.debug(&format!("Resolved {} to {}", key, resolved));
        Ok(resolved)
    }
}
