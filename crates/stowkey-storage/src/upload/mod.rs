//! Upload orchestration
//!
//! A payload that fits in one part is sent with a single put. Anything larger
//! goes through a multipart upload with a bounded number of parts in flight,
//! sent while the source is still being read. A multipart upload that fails,
//! or whose future is dropped, is aborted so the store keeps no parts and the
//! key stays unaddressable.

mod source;

pub use source::{
    BufferSource, DeferredUpload, FormFile, LazyFile, ResolvedUpload, StreamSource, UploadSource,
};

use crate::backend::{BodyStream, CompletedPart, ObjectBackend, ObjectParams};
use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt, TryStreamExt};
use std::sync::Arc;
use stowkey_core::types::{CannedAcl, UploadOptions, UploadResult};
use stowkey_core::utils::resolve_content_type;
use stowkey_core::{Error, ObjectKey, PrefixResolver, ResolvedKey, Result, StorageConfig, MAX_PARTS};
use tracing::{debug, info, warn};

/// Drives uploads against one backend
#[derive(Clone)]
pub struct Uploader {
    backend: Arc<dyn ObjectBackend>,
    resolver: PrefixResolver,
    part_size: usize,
    max_concurrent_parts: usize,
    default_acl: CannedAcl,
}

impl Uploader {
    pub fn new(
        backend: Arc<dyn ObjectBackend>,
        resolver: PrefixResolver,
        config: &StorageConfig,
    ) -> Self {
        Self {
            backend,
            resolver,
            part_size: config.part_size.max(1) as usize,
            max_concurrent_parts: config.max_concurrent_parts.max(1),
            default_acl: config.default_acl,
        }
    }

    /// Upload `source` under `key` (prefixed here).
    ///
    /// Returns only once the store has the whole object. A multipart upload
    /// that fails is aborted and reported as [`Error::UploadAborted`]; a
    /// failed single put or source read is returned unchanged.
    pub async fn upload(
        &self,
        source: UploadSource,
        key: &ObjectKey,
        options: UploadOptions,
    ) -> Result<UploadResult> {
        let resolved = self.resolver.resolve(key)?;
        let body = source.prepare().await?;

        let content_type = resolve_content_type(
            options.content_type.as_deref(),
            Some(body.filename.as_deref().unwrap_or_else(|| key.file_name())),
            body.reported_type.as_deref(),
        );
        let params = ObjectParams {
            acl: options.acl.unwrap_or(self.default_acl),
            content_type,
            cache_control: options.cache_control,
            metadata: options.metadata,
        };

        let mut chunker = PartChunker::new(body.stream, self.part_size);
        let first = chunker.next_part().await?.unwrap_or_default();

        let (etag, size) = if chunker.has_more().await? {
            self.upload_multipart(&resolved, &params, first, &mut chunker)
                .await?
        } else {
            let size = first.len() as u64;
            let etag = self.backend.put_object(&resolved, &params, first).await?;
            (etag, size)
        };

        let location = self.resolver.url_for(&resolved);
        info!(
            "Uploaded {} ({} bytes, {}) to bucket {}",
            resolved,
            size,
            params.content_type,
            self.backend.bucket()
        );

        Ok(UploadResult {
            location,
            key: resolved,
            etag,
            content_type: params.content_type,
            size,
        })
    }

    async fn upload_multipart(
        &self,
        key: &ResolvedKey,
        params: &ObjectParams,
        first: Bytes,
        chunker: &mut PartChunker,
    ) -> Result<(Option<String>, u64)> {
        let upload_id = self
            .backend
            .create_multipart_upload(key, params)
            .await
            .map_err(|e| Error::aborted(key.as_str(), e))?;
        debug!("Started multipart upload {} for {}", upload_id, key);

        let mut guard = AbortGuard::new(self.backend.clone(), key.clone(), upload_id.clone());

        let outcome = match self.transfer_parts(key, &upload_id, first, chunker).await {
            Ok((parts, size)) => self
                .backend
                .complete_multipart_upload(key, &upload_id, parts)
                .await
                .map(|etag| (etag, size)),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(done) => {
                guard.disarm();
                Ok(done)
            }
            Err(e) => {
                warn!("Multipart upload {} for {} failed: {}", upload_id, key, e);
                // stays armed until the abort returns
                if let Err(abort_err) = self.backend.abort_multipart_upload(key, &upload_id).await {
                    warn!(
                        "Failed to abort multipart upload {} for {}: {}",
                        upload_id, key, abort_err
                    );
                }
                guard.disarm();
                Err(Error::aborted(key.as_str(), e))
            }
        }
    }

    /// Send parts as the source produces them. Reading and the parts in
    /// flight are polled together, so a slow source never holds back parts
    /// that were already handed off.
    async fn transfer_parts(
        &self,
        key: &ResolvedKey,
        upload_id: &str,
        first: Bytes,
        chunker: &mut PartChunker,
    ) -> Result<(Vec<CompletedPart>, u64)> {
        let mut in_flight = FuturesUnordered::new();
        let mut completed = Vec::new();
        let mut next = Some(first);
        let mut exhausted = false;
        let mut part_number: i32 = 0;
        let mut size = 0u64;

        loop {
            if let Some(data) = next.take() {
                part_number += 1;
                if part_number as u32 > MAX_PARTS {
                    return Err(Error::InvalidArgument(format!(
                        "upload needs more than {} parts of {} bytes",
                        MAX_PARTS, self.part_size
                    )));
                }
                size += data.len() as u64;
                debug!("Uploading part {} ({} bytes) of {}", part_number, data.len(), key);
                in_flight.push(self.send_part(key, upload_id, part_number, data));
            }

            let can_read = !exhausted && in_flight.len() < self.max_concurrent_parts;
            if in_flight.is_empty() && !can_read {
                break;
            }

            tokio::select! {
                Some(part) = in_flight.next(), if !in_flight.is_empty() => {
                    completed.push(part?);
                }
                read = chunker.next_part(), if can_read => match read? {
                    Some(data) => next = Some(data),
                    None => exhausted = true,
                },
            }
        }

        completed.sort_by_key(|p: &CompletedPart| p.part_number);
        Ok((completed, size))
    }

    fn send_part(
        &self,
        key: &ResolvedKey,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> BoxFuture<'static, Result<CompletedPart>> {
        let backend = self.backend.clone();
        let key = key.clone();
        let upload_id = upload_id.to_string();
        async move {
            backend
                .upload_part(&key, &upload_id, part_number, data)
                .await
        }
        .boxed()
    }
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("bucket", &self.backend.bucket())
            .field("part_size", &self.part_size)
            .field("max_concurrent_parts", &self.max_concurrent_parts)
            .finish()
    }
}

/// Splits a byte stream into parts of exactly `part_size` bytes (the last
/// one may be shorter).
///
/// Buffered bytes live in `buf`, so a `next_part` future dropped mid-read
/// loses nothing.
struct PartChunker {
    stream: BodyStream,
    buf: BytesMut,
    part_size: usize,
    done: bool,
}

impl PartChunker {
    fn new(stream: BodyStream, part_size: usize) -> Self {
        Self {
            stream,
            buf: BytesMut::new(),
            part_size,
            done: false,
        }
    }

    async fn next_part(&mut self) -> Result<Option<Bytes>> {
        while self.buf.len() < self.part_size && !self.done {
            self.read_chunk().await?;
        }
        if self.buf.is_empty() {
            return Ok(None);
        }
        let len = self.buf.len().min(self.part_size);
        Ok(Some(self.buf.split_to(len).freeze()))
    }

    /// Whether any bytes remain after the parts taken so far
    async fn has_more(&mut self) -> Result<bool> {
        while self.buf.is_empty() && !self.done {
            self.read_chunk().await?;
        }
        Ok(!self.buf.is_empty())
    }

    async fn read_chunk(&mut self) -> Result<()> {
        match self.stream.try_next().await? {
            Some(chunk) => self.buf.extend_from_slice(&chunk),
            None => self.done = true,
        }
        Ok(())
    }
}

/// Aborts a multipart upload if dropped while armed
struct AbortGuard {
    backend: Arc<dyn ObjectBackend>,
    key: ResolvedKey,
    upload_id: String,
    armed: bool,
}

impl AbortGuard {
    fn new(backend: Arc<dyn ObjectBackend>, key: ResolvedKey, upload_id: String) -> Self {
        Self {
            backend,
            key,
            upload_id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        warn!(
            "Upload of {} cancelled, aborting multipart upload {}",
            self.key, self.upload_id
        );

        let backend = self.backend.clone();
        let key = self.key.clone();
        let upload_id = std::mem::take(&mut self.upload_id);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = backend.abort_multipart_upload(&key, &upload_id).await {
                        warn!("Failed to abort multipart upload {} for {}: {}", upload_id, key, e);
                    }
                });
            }
            Err(_) => warn!(
                "No runtime to abort multipart upload {} for {}; it stays pending",
                upload_id, key
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use futures::stream;
    use std::io;
    use std::time::Duration;

    const PART: u64 = 8;

    // `Uploader::new` takes the part size as given; only `validate` enforces
    // the S3 minimum, which keeps these parts small.
    fn setup() -> (Arc<MemoryBackend>, Uploader) {
        let mut config = StorageConfig::new("AKIA", "secret", "media", "us-east-1")
            .with_prefix("prod");
        config.part_size = PART;
        config.max_concurrent_parts = 2;

        let backend = Arc::new(MemoryBackend::new("media"));
        let resolver = PrefixResolver::from_config(&config).unwrap();
        let uploader = Uploader::new(backend.clone(), resolver, &config);
        (backend, uploader)
    }

    fn key(s: &str) -> ObjectKey {
        ObjectKey::parse(s).unwrap()
    }

    async fn stored(backend: &MemoryBackend, key: &str) -> Bytes {
        let key = ResolvedKey::from_stored(key).unwrap();
        backend.get_object(&key).await.unwrap().collect().await.unwrap()
    }

    #[tokio::test]
    async fn test_small_buffer_single_put() {
        let (backend, uploader) = setup();

        let result = uploader
            .upload(
                UploadSource::from_bytes("tiny"),
                &key("/users/1/avatar.png"),
                UploadOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.key.as_str(), "/prod/users/1/avatar.png");
        assert_eq!(
            result.location,
            "https://media.s3.us-east-1.amazonaws.com/prod/users/1/avatar.png"
        );
        assert_eq!(result.content_type, "image/png");
        assert_eq!(result.size, 4);
        assert_eq!(backend.request_count(), 1);
        assert_eq!(backend.object_acl("/prod/users/1/avatar.png"), Some(CannedAcl::PublicRead));
    }

    #[tokio::test]
    async fn test_exact_part_size_single_put() {
        let (backend, uploader) = setup();
        uploader
            .upload(
                UploadSource::from_bytes(vec![7u8; PART as usize]),
                &key("/a.bin"),
                UploadOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_large_buffer_multipart() {
        let (backend, uploader) = setup();
        let data: Vec<u8> = (0..30u8).collect();

        let result = uploader
            .upload(
                UploadSource::from_bytes(data.clone()),
                &key("/big.bin"),
                UploadOptions::default().acl(CannedAcl::Private),
            )
            .await
            .unwrap();

        // create + 4 parts + complete
        assert_eq!(backend.request_count(), 6);
        assert_eq!(result.size, 30);
        assert!(result.etag.unwrap().ends_with("-4\""));
        assert_eq!(&stored(&backend, "/prod/big.bin").await[..], &data[..]);
        assert_eq!(backend.object_acl("/prod/big.bin"), Some(CannedAcl::Private));
        assert_eq!(backend.pending_uploads(), 0);
    }

    #[tokio::test]
    async fn test_stream_source_uneven_chunks() {
        let (backend, uploader) = setup();
        let chunks = vec![
            Ok(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"defghijklm")),
            Ok(Bytes::from_static(b"n")),
            Ok(Bytes::from_static(b"opqrstu")),
        ];

        let result = uploader
            .upload(
                UploadSource::from_stream(stream::iter(chunks)).with_filename("letters.txt"),
                &key("/letters.txt"),
                UploadOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.size, 21);
        assert_eq!(result.content_type, "text/plain");
        assert_eq!(&stored(&backend, "/prod/letters.txt").await[..], b"abcdefghijklmnopqrstu");
    }

    #[tokio::test]
    async fn test_content_type_resolution() {
        let (_backend, uploader) = setup();

        let explicit = uploader
            .upload(
                UploadSource::from_bytes("x"),
                &key("/a.png"),
                UploadOptions::default().content_type("image/webp"),
            )
            .await
            .unwrap();
        assert_eq!(explicit.content_type, "image/webp");

        let reported = uploader
            .upload(
                UploadSource::from_form_file(FormFile {
                    original_name: "blob".into(),
                    mimetype: Some("application/pdf".into()),
                    data: Bytes::from_static(b"%PDF"),
                }),
                &key("/docs/blob"),
                UploadOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(reported.content_type, "application/pdf");

        let fallback = uploader
            .upload(
                UploadSource::from_bytes("x"),
                &key("/docs/blob"),
                UploadOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(fallback.content_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn test_deferred_source() {
        use std::io::Write;

        let (backend, uploader) = setup();
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(br#"{"hello":"world","n":1}"#).unwrap();

        let result = uploader
            .upload(
                UploadSource::deferred(LazyFile::new(file.path())),
                &key("/data/payload"),
                UploadOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.content_type, "application/json");
        assert_eq!(result.size, 23);
        assert!(backend.contains("/prod/data/payload"));
    }

    #[tokio::test]
    async fn test_part_failure_aborts_once() {
        let (backend, uploader) = setup();
        backend.fail_part(2);

        let err = uploader
            .upload(
                UploadSource::from_bytes(vec![1u8; 40]),
                &key("/big.bin"),
                UploadOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UploadAborted { .. }));
        assert!(!backend.contains("/prod/big.bin"));
        assert_eq!(backend.pending_uploads(), 0);
        assert_eq!(backend.aborted_uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_complete_failure_aborts() {
        let (backend, uploader) = setup();
        backend.fail_complete();

        let err = uploader
            .upload(
                UploadSource::from_bytes(vec![1u8; 20]),
                &key("/big.bin"),
                UploadOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UploadAborted { .. }));
        assert!(!backend.contains("/prod/big.bin"));
        assert_eq!(backend.aborted_uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_error_aborts() {
        let (backend, uploader) = setup();
        let chunks = vec![
            Ok(Bytes::from(vec![0u8; 20])),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
        ];

        let err = uploader
            .upload(
                UploadSource::from_stream(stream::iter(chunks)),
                &key("/big.bin"),
                UploadOptions::default(),
            )
            .await
            .unwrap_err();

        match err {
            Error::UploadAborted { key, source } => {
                assert_eq!(key, "/prod/big.bin");
                assert!(matches!(*source, Error::Io(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!backend.contains("/prod/big.bin"));
        assert_eq!(backend.pending_uploads(), 0);
        assert_eq!(backend.aborted_uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_upload_is_aborted() {
        let (backend, uploader) = setup();
        let source = stream::iter(vec![Ok::<_, io::Error>(Bytes::from(vec![0u8; 20]))])
            .chain(stream::pending());

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            uploader.upload(
                UploadSource::from_stream(source),
                &key("/slow.bin"),
                UploadOptions::default(),
            ),
        )
        .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(backend.aborted_uploads().len(), 1);
        assert_eq!(backend.pending_uploads(), 0);
        assert!(!backend.contains("/prod/slow.bin"));
    }

    #[tokio::test]
    async fn test_parts_sent_while_source_stalls() {
        let (backend, uploader) = setup();
        let source = stream::iter(vec![Ok::<_, io::Error>(Bytes::from(vec![3u8; 16]))])
            .chain(stream::pending());

        let result = tokio::time::timeout(
            Duration::from_millis(100),
            uploader.upload(
                UploadSource::from_stream(source),
                &key("/stalled.bin"),
                UploadOptions::default(),
            ),
        )
        .await;
        assert!(result.is_err());

        // create + both full parts, before the source produced more
        assert_eq!(backend.request_count(), 3);
    }

    #[tokio::test]
    async fn test_slow_source_keeps_every_byte() {
        let (backend, uploader) = setup();
        let data: Vec<u8> = (0..35u8).collect();
        let chunks: Vec<io::Result<Bytes>> = data
            .chunks(5)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        let source = stream::iter(chunks).then(|chunk| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            chunk
        });

        let result = uploader
            .upload(UploadSource::from_stream(source), &key("/slow.bin"), UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(result.size, 35);
        assert!(result.etag.unwrap().ends_with("-5\""));
        assert_eq!(&stored(&backend, "/prod/slow.bin").await[..], &data[..]);
    }

    #[tokio::test]
    async fn test_failed_single_put_is_returned_unchanged() {
        let (backend, uploader) = setup();
        backend.fail_put();

        let err = uploader
            .upload(UploadSource::from_bytes("tiny"), &key("/a.txt"), UploadOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Backend { operation: "put_object", .. }));
        assert!(!backend.contains("/prod/a.txt"));
        assert!(backend.aborted_uploads().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_during_abort_still_aborts() {
        let (backend, uploader) = setup();
        backend.fail_part(2);
        backend.delay_aborts(Duration::from_millis(50));

        let result = tokio::time::timeout(
            Duration::from_millis(20),
            uploader.upload(
                UploadSource::from_bytes(vec![1u8; 40]),
                &key("/big.bin"),
                UploadOptions::default(),
            ),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(backend.pending_uploads(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(backend.pending_uploads(), 0);
        assert_eq!(backend.aborted_uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_prefixed_key_over_limit_is_rejected() {
        let (backend, uploader) = setup();
        let long = key(&format!("/{}", "a".repeat(stowkey_core::MAX_KEY_LENGTH - 1)));

        let err = uploader
            .upload(UploadSource::from_bytes("x"), &long, UploadOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidKey(_)));
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_source_creates_empty_object() {
        let (backend, uploader) = setup();
        let result = uploader
            .upload(
                UploadSource::from_stream(stream::empty()),
                &key("/empty.txt"),
                UploadOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.size, 0);
        assert!(backend.contains("/prod/empty.txt"));
    }
}
