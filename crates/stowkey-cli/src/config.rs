//! Profile management for the Stowkey CLI
//!
//! Config file location: ~/.stowkey/config.toml
//!
//! Example config:
//! ```toml
//! [default]
//! access_key_id = "AKIA..."
//! secret_access_key = "..."
//! bucket = "media"
//! region = "eu-west-1"
//! prefix = "dev"
//!
//! [production]
//! access_key_id = "AKIA..."
//! secret_access_key = "..."
//! bucket = "media"
//! prefix = "prod"
//! ```
//!
//! Environment variables (`STOWKEY_*`, `AWS_*`) override the selected profile.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use stowkey_core::StorageConfig;

/// Configuration file with multiple profiles
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub profiles: BTreeMap<String, StorageConfig>,
}

/// Reads and writes one profile file
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Use `path`, or ~/.stowkey/config.toml when `None`
    pub fn open(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        Ok(Self { path })
    }

    pub fn default_path() -> Result<PathBuf> {
        let home = directories::BaseDirs::new()
            .context("Could not determine home directory")?
            .home_dir()
            .to_path_buf();

        Ok(home.join(".stowkey").join("config.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<ConfigFile> {
        if !self.path.exists() {
            return Ok(ConfigFile::default());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config file: {:?}", self.path))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", self.path))
    }

    fn write(&self, file: &ConfigFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(file)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write config file: {:?}", self.path))?;
        Ok(())
    }

    /// Stored profile without environment overrides
    pub fn profile(&self, name: &str) -> Result<StorageConfig> {
        Ok(self.read()?.profiles.remove(name).unwrap_or_default())
    }

    /// Profile with environment overrides applied
    pub fn load_profile(&self, name: &str) -> Result<StorageConfig> {
        let mut config = self.profile(name)?;
        config.apply_env()?;
        Ok(config)
    }

    pub fn save_profile(&self, name: &str, config: &StorageConfig) -> Result<()> {
        let mut file = self.read()?;
        file.profiles.insert(name.to_string(), config.clone());
        self.write(&file)
    }

    pub fn list_profiles(&self) -> Result<Vec<String>> {
        Ok(self.read()?.profiles.into_keys().collect())
    }

    pub fn delete_profile(&self, name: &str) -> Result<bool> {
        let mut file = self.read()?;
        let removed = file.profiles.remove(name).is_some();
        if removed {
            self.write(&file)?;
        }
        Ok(removed)
    }
}

/// Keys accepted by `configure get/set`
pub const KEYS: &[&str] = &[
    "access_key_id",
    "secret_access_key",
    "bucket",
    "region",
    "prefix",
    "endpoint",
    "path_style",
    "default_acl",
    "default_expires_in",
    "part_size",
    "max_concurrent_parts",
];

/// Get a config value by key name
pub fn get_value(config: &StorageConfig, key: &str) -> Option<String> {
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    match key {
        "access_key_id" => non_empty(&config.access_key_id),
        "secret_access_key" => non_empty(&config.secret_access_key).map(|_| "***".to_string()),
        "bucket" => non_empty(&config.bucket),
        "region" => Some(config.region.clone()),
        "prefix" => config.prefix.clone(),
        "endpoint" => config.endpoint.clone(),
        "path_style" => Some(config.path_style.to_string()),
        "default_acl" => Some(config.default_acl.to_string()),
        "default_expires_in" => Some(config.default_expires_in.to_string()),
        "part_size" => Some(config.part_size.to_string()),
        "max_concurrent_parts" => Some(config.max_concurrent_parts.to_string()),
        _ => None,
    }
}

/// Set a config value by key name
pub fn set_value(config: &mut StorageConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "access_key_id" => config.access_key_id = value.to_string(),
        "secret_access_key" => config.secret_access_key = value.to_string(),
        "bucket" => config.bucket = value.to_string(),
        "region" => config.region = value.to_string(),
        "prefix" => config.prefix = Some(value.to_string()).filter(|v| !v.is_empty()),
        "endpoint" => config.endpoint = Some(value.to_string()).filter(|v| !v.is_empty()),
        "path_style" => config.path_style = value.parse()?,
        "default_acl" => config.default_acl = value.parse().map_err(anyhow::Error::msg)?,
        "default_expires_in" => config.default_expires_in = value.parse()?,
        "part_size" => config.part_size = value.parse()?,
        "max_concurrent_parts" => config.max_concurrent_parts = value.parse()?,
        _ => anyhow::bail!("Unknown config key: {} (expected one of {})", key, KEYS.join(", ")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowkey_core::types::CannedAcl;

    fn store(dir: &tempfile::TempDir) -> ConfigStore {
        ConfigStore::open(Some(dir.path().join("nested").join("config.toml"))).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        assert!(store.list_profiles().unwrap().is_empty());
        assert_eq!(store.profile("default").unwrap(), StorageConfig::default());
    }

    #[test]
    fn test_profile_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let dev = StorageConfig::new("AKIA", "secret", "media", "eu-west-1").with_prefix("dev");
        let prod = StorageConfig::new("AKIA", "secret", "media", "eu-west-1").with_prefix("prod");
        store.save_profile("default", &dev).unwrap();
        store.save_profile("production", &prod).unwrap();

        assert_eq!(store.list_profiles().unwrap(), vec!["default", "production"]);
        assert_eq!(store.profile("production").unwrap(), prod);

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("[production]"));
        assert!(content.contains("prefix = \"prod\""));

        assert!(store.delete_profile("production").unwrap());
        assert!(!store.delete_profile("production").unwrap());
        assert_eq!(store.list_profiles().unwrap(), vec!["default"]);
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "[default\nbucket = ").unwrap();

        let err = store.read().unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }

    #[test]
    fn test_get_set_values() {
        let mut config = StorageConfig::default();
        set_value(&mut config, "bucket", "media").unwrap();
        set_value(&mut config, "secret_access_key", "s3cr3t").unwrap();
        set_value(&mut config, "default_acl", "private").unwrap();
        set_value(&mut config, "part_size", "10485760").unwrap();

        assert_eq!(get_value(&config, "bucket").as_deref(), Some("media"));
        assert_eq!(get_value(&config, "secret_access_key").as_deref(), Some("***"));
        assert_eq!(config.default_acl, CannedAcl::Private);
        assert_eq!(config.part_size, 10 * 1024 * 1024);
        assert_eq!(get_value(&config, "prefix"), None);

        assert!(set_value(&mut config, "part_size", "big").is_err());
        assert!(set_value(&mut config, "default_acl", "everyone").is_err());
        assert!(set_value(&mut config, "colour", "blue").is_err());
    }

    #[test]
    fn test_every_key_is_readable() {
        let config = StorageConfig::new("AKIA", "secret", "media", "us-east-1")
            .with_prefix("dev")
            .with_endpoint("http://localhost:9000", true);
        for key in KEYS {
            assert!(get_value(&config, key).is_some(), "{} should be set", key);
        }
    }
}
