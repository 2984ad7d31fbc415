//! Object store facade
//!
//! One [`ObjectStore`] per bucket: it owns the configuration, the prefix
//! resolver and the backend, and hands out key builders.

use crate::backend::{MemoryBackend, ObjectBackend, ObjectBody, S3Backend};
use crate::signer::SignedUrlIssuer;
use crate::upload::{UploadSource, Uploader};
use std::sync::Arc;
use stowkey_core::types::{ObjectInfo, SignOperation, SignOptions, SignedUrl, UploadOptions, UploadResult};
use stowkey_core::{KeyBuilder, ObjectKey, PrefixResolver, ResolvedKey, Result, StorageConfig};
use tracing::info;

#[derive(Clone)]
pub struct ObjectStore {
    config: Arc<StorageConfig>,
    backend: Arc<dyn ObjectBackend>,
    resolver: PrefixResolver,
    uploader: Uploader,
    signer: SignedUrlIssuer,
}

impl ObjectStore {
    /// Store backed by S3 (or the configured S3-compatible endpoint)
    pub fn new(config: StorageConfig) -> Result<Self> {
        let backend = Arc::new(S3Backend::new(&config)?);
        Self::with_backend(config, backend)
    }

    /// Store backed by process memory, signing with the configured credentials
    pub fn in_memory(config: StorageConfig) -> Result<Self> {
        let backend = Arc::new(MemoryBackend::from_config(&config)?);
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: StorageConfig, backend: Arc<dyn ObjectBackend>) -> Result<Self> {
        config.validate()?;
        let resolver = PrefixResolver::from_config(&config)?;

        Ok(Self {
            uploader: Uploader::new(backend.clone(), resolver.clone(), &config),
            signer: SignedUrlIssuer::new(backend.clone(), resolver.clone(), &config),
            config: Arc::new(config),
            backend,
            resolver,
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn ObjectBackend> {
        &self.backend
    }

    pub fn resolver(&self) -> &PrefixResolver {
        &self.resolver
    }

    /// A fresh key builder rooted at `base_module`
    pub fn key_builder(&self, base_module: &str) -> KeyBuilder {
        KeyBuilder::new(base_module)
    }

    /// Validate `key` and apply the environment prefix
    pub fn add_prefix(&self, key: &str) -> Result<ResolvedKey> {
        self.resolver.add_prefix(key)
    }

    /// Public URL of an unprefixed key
    pub fn file_url(&self, key: &str) -> Result<String> {
        self.resolver.resolve_url(&ObjectKey::parse(key)?)
    }

    /// Public URL of a resolved key
    pub fn url_for(&self, key: &ResolvedKey) -> String {
        self.resolver.url_for(key)
    }

    pub fn unique_key(&self, filename: &str) -> ObjectKey {
        stowkey_core::unique_key(filename)
    }

    pub async fn get_signed_url(
        &self,
        key: &str,
        operation: SignOperation,
        options: SignOptions,
    ) -> Result<SignedUrl> {
        self.signer.get_signed_url(key, operation, options).await
    }

    pub async fn upload(
        &self,
        source: UploadSource,
        key: &ObjectKey,
        options: UploadOptions,
    ) -> Result<UploadResult> {
        self.uploader.upload(source, key, options).await
    }

    /// Upload to `folder/name`; a `/` folder is the bucket root
    pub async fn upload_to(
        &self,
        source: UploadSource,
        folder: &str,
        name: &str,
        options: UploadOptions,
    ) -> Result<UploadResult> {
        let key = ObjectKey::join(folder, name)?;
        self.upload(source, &key, options).await
    }

    pub async fn file_info(&self, key: &ResolvedKey) -> Result<ObjectInfo> {
        self.backend.head_object(key).await
    }

    pub async fn file(&self, key: &ResolvedKey) -> Result<ObjectBody> {
        self.backend.get_object(key).await
    }

    pub async fn remove_file(&self, key: &ResolvedKey) -> Result<()> {
        self.backend.delete_object(key).await?;
        info!("Removed {} from bucket {}", key, self.backend.bucket());
        Ok(())
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("bucket", &self.config.bucket)
            .field("prefix", &self.resolver.prefix())
            .field("base_url", &self.resolver.base_url())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowkey_core::types::CannedAcl;
    use stowkey_core::Error;

    fn config() -> StorageConfig {
        StorageConfig::new("AKIA", "secret", "media", "eu-west-1").with_prefix("/prod/")
    }

    fn store() -> ObjectStore {
        ObjectStore::in_memory(config()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = config();
        config.bucket.clear();
        assert!(matches!(
            ObjectStore::in_memory(config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_part_size_below_s3_minimum() {
        let mut config = config();
        config.part_size = 1024 * 1024;
        assert!(matches!(
            ObjectStore::in_memory(config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_traversal_cannot_leave_prefix() {
        let store = store();
        assert!(matches!(store.add_prefix("/../secret.txt"), Err(Error::InvalidKey(_))));
        assert!(store.file_url("/users/../../secret.txt").is_err());
    }

    #[test]
    fn test_urls_carry_prefix_once() {
        let store = store();
        let key = store.add_prefix("/users/1.jpg").unwrap();
        assert_eq!(key.as_str(), "/prod/users/1.jpg");
        assert_eq!(
            store.url_for(&key),
            "https://media.s3.eu-west-1.amazonaws.com/prod/users/1.jpg"
        );
        assert_eq!(store.file_url("/users/1.jpg").unwrap(), store.url_for(&key));
        assert!(store.file_url("users/1.jpg").is_err());
    }

    #[tokio::test]
    async fn test_builder_upload_info_get_remove() {
        let store = store();
        let key = store
            .key_builder("users")
            .module("profile")
            .build(Some(&42), "me.jpg", Some("avatar"));
        assert_eq!(key.as_str(), "/users/42/profile/avatar.jpg");

        let uploaded = store
            .upload(
                UploadSource::from_bytes("jpeg bytes"),
                &key,
                UploadOptions::default().metadata("owner", "42"),
            )
            .await
            .unwrap();
        assert_eq!(uploaded.key.as_str(), "/prod/users/42/profile/avatar.jpg");
        assert_eq!(uploaded.content_type, "image/jpeg");

        // a key read back from storage is used as-is
        let stored = ResolvedKey::from_stored(uploaded.key.as_str()).unwrap();
        let info = store.file_info(&stored).await.unwrap();
        assert_eq!(info.size, 10);
        assert_eq!(info.metadata.get("owner").map(String::as_str), Some("42"));

        let body = store.file(&stored).await.unwrap().collect().await.unwrap();
        assert_eq!(&body[..], b"jpeg bytes");

        store.remove_file(&stored).await.unwrap();
        assert!(store.file_info(&stored).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_upload_to_folder() {
        let store = store();
        let root = store
            .upload_to(UploadSource::from_bytes("a"), "/", "a.txt", UploadOptions::default())
            .await
            .unwrap();
        assert_eq!(root.key.as_str(), "/prod/a.txt");

        let nested = store
            .upload_to(
                UploadSource::from_bytes("b"),
                "/docs/2024",
                "b.txt",
                UploadOptions::default().acl(CannedAcl::Private),
            )
            .await
            .unwrap();
        assert_eq!(nested.key.as_str(), "/prod/docs/2024/b.txt");

        assert!(store
            .upload_to(UploadSource::from_bytes("c"), "/docs", "../c.txt", UploadOptions::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unique_key_keeps_extension() {
        let store = store();
        let key = store.unique_key("holiday.JPG");
        assert!(key.as_str().ends_with(".JPG"));

        let result = store
            .upload(UploadSource::from_bytes("x"), &key, UploadOptions::default())
            .await
            .unwrap();
        assert_eq!(result.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_signed_url_uses_prefix() {
        let store = store();
        let signed = store
            .get_signed_url("/users/1.jpg", SignOperation::Get, SignOptions::default())
            .await
            .unwrap();
        assert!(signed.url.contains("/media/prod/users/1.jpg?"));
        assert!(!signed.url.contains("prod/prod"));
    }
}
