//! Signed URL issuance

use crate::backend::ObjectBackend;
use std::sync::Arc;
use std::time::Duration;
use stowkey_core::types::{
    CannedAcl, PresignRequest, PresignedLimits, SignOperation, SignOptions, SignedUrl,
};
use stowkey_core::{PrefixResolver, Result, StorageConfig};
use tracing::debug;

/// Issues time-limited GET and PUT URLs for prefixed keys
#[derive(Clone)]
pub struct SignedUrlIssuer {
    backend: Arc<dyn ObjectBackend>,
    resolver: PrefixResolver,
    default_acl: CannedAcl,
    default_expires_in: u64,
}

impl SignedUrlIssuer {
    pub fn new(
        backend: Arc<dyn ObjectBackend>,
        resolver: PrefixResolver,
        config: &StorageConfig,
    ) -> Self {
        Self {
            backend,
            resolver,
            default_acl: config.default_acl,
            default_expires_in: config.default_expires_in,
        }
    }

    /// Sign `key` (prefixed here) for `operation`.
    ///
    /// Key and expiry are validated before the backend is involved.
    pub async fn get_signed_url(
        &self,
        key: &str,
        operation: SignOperation,
        options: SignOptions,
    ) -> Result<SignedUrl> {
        let request = self.presign_request(key, operation, options)?;
        debug!(
            "Signing {} {} for {}s",
            request.operation.method(),
            request.key,
            request.expires_in.as_secs()
        );
        self.backend.presign(&request).await
    }

    /// Build the request a backend signs. A `put` binds the ACL and the
    /// content type; a `get` binds neither.
    pub fn presign_request(
        &self,
        key: &str,
        operation: SignOperation,
        options: SignOptions,
    ) -> Result<PresignRequest> {
        let key = self.resolver.add_prefix(key)?;
        let expires_in =
            PresignedLimits::resolve_expires(options.expires_in, self.default_expires_in)?;

        let (acl, content_type) = match operation {
            SignOperation::Get => (None, None),
            SignOperation::Put => (
                Some(options.acl.unwrap_or(self.default_acl)),
                options.content_type.filter(|c| !c.trim().is_empty()),
            ),
        };

        Ok(PresignRequest {
            key,
            operation,
            expires_in: Duration::from_secs(expires_in),
            acl,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use bytes::Bytes;
    use stowkey_core::Error;

    fn setup() -> (Arc<MemoryBackend>, SignedUrlIssuer) {
        let config = StorageConfig::new("AKIA", "secret", "media", "us-east-1").with_prefix("dev");
        let backend = Arc::new(MemoryBackend::new("media"));
        let resolver = PrefixResolver::from_config(&config).unwrap();
        let issuer = SignedUrlIssuer::new(backend.clone(), resolver, &config);
        (backend, issuer)
    }

    #[test]
    fn test_get_request_drops_put_bindings() {
        let (_, issuer) = setup();
        let request = issuer
            .presign_request(
                "/users/1.png",
                SignOperation::Get,
                SignOptions::default().acl(CannedAcl::Private).content_type("image/png"),
            )
            .unwrap();

        assert_eq!(request.key.as_str(), "/dev/users/1.png");
        assert_eq!(request.expires_in, Duration::from_secs(300));
        assert_eq!(request.acl, None);
        assert_eq!(request.content_type, None);
    }

    #[test]
    fn test_put_request_defaults_acl() {
        let (_, issuer) = setup();
        let request = issuer
            .presign_request("/users/1.png", SignOperation::Put, SignOptions::default().expires_in(0))
            .unwrap();

        assert_eq!(request.acl, Some(CannedAcl::PublicRead));
        assert_eq!(request.expires_in, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_validation_before_backend() {
        let (backend, issuer) = setup();

        let relative = issuer
            .get_signed_url("users/1.png", SignOperation::Get, SignOptions::default())
            .await;
        assert!(matches!(relative, Err(Error::InvalidKey(_))));

        let too_long = issuer
            .get_signed_url(
                "/users/1.png",
                SignOperation::Get,
                SignOptions::default().expires_in(PresignedLimits::MAX_EXPIRES + 1),
            )
            .await;
        assert!(matches!(too_long, Err(Error::InvalidArgument(_))));

        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test]
    async fn test_put_url_binds_content_type_and_acl() {
        let (backend, issuer) = setup();
        let signed = issuer
            .get_signed_url(
                "/users/1.png",
                SignOperation::Put,
                SignOptions::default().acl(CannedAcl::Private).content_type("image/png"),
            )
            .await
            .unwrap();

        assert_eq!(signed.method, "PUT");
        assert_eq!(signed.header("content-type"), Some("image/png"));

        let wrong_type = backend.put_presigned(
            &signed.url,
            &[("content-type", "image/gif"), ("x-amz-acl", "private")],
            Bytes::from_static(b"GIF89a"),
        );
        assert!(matches!(wrong_type, Err(Error::SignatureDoesNotMatch)));

        let wrong_acl = backend.put_presigned(
            &signed.url,
            &[("content-type", "image/png"), ("x-amz-acl", "public-read")],
            Bytes::from_static(b"png"),
        );
        assert!(matches!(wrong_acl, Err(Error::SignatureDoesNotMatch)));

        let key = backend
            .put_presigned(
                &signed.url,
                &[("content-type", "image/png"), ("x-amz-acl", "private")],
                Bytes::from_static(b"png"),
            )
            .unwrap();
        assert_eq!(key.as_str(), "/dev/users/1.png");
        assert_eq!(backend.object_acl("/dev/users/1.png"), Some(CannedAcl::Private));
    }

    #[tokio::test]
    async fn test_get_url_downloads() {
        let (backend, issuer) = setup();
        let put = issuer
            .get_signed_url("/notes.txt", SignOperation::Put, SignOptions::default())
            .await
            .unwrap();
        backend
            .put_presigned(&put.url, &[("x-amz-acl", "public-read")], Bytes::from_static(b"hi"))
            .unwrap();

        let get = issuer
            .get_signed_url("/notes.txt", SignOperation::Get, SignOptions::default().expires_in(60))
            .await
            .unwrap();
        assert_eq!(get.method, "GET");
        assert!(get.headers.is_empty());
        assert_eq!(&backend.get_presigned(&get.url).unwrap()[..], b"hi");
    }
}
