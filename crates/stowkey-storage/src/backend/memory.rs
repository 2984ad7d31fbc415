//! In-process object store
//!
//! Keeps objects and in-progress multipart uploads in memory. Objects only
//! become visible when a put or a multipart completion succeeds, the same as
//! on S3. Failure injection (`fail_put`, `fail_part`, `fail_complete`,
//! `delay_aborts`)
//! and request counters let callers observe the abort path without a network.

use super::sigv4::{self, SigningKey};
use super::{BodyStream, CompletedPart, ObjectBackend, ObjectBody, ObjectParams};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use md5::{Digest, Md5};
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use stowkey_core::types::{CannedAcl, ObjectInfo, PresignRequest, SignedUrl};
use stowkey_core::{Error, ResolvedKey, Result, StorageConfig, DEFAULT_CONTENT_TYPE};
use tracing::{debug, info};

const ENDPOINT: &str = "http://memory.local";

struct StoredObject {
    data: Bytes,
    params: ObjectParams,
    etag: String,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn info(&self, key: &ResolvedKey) -> ObjectInfo {
        ObjectInfo {
            key: key.clone(),
            size: self.data.len() as u64,
            content_type: Some(self.params.content_type.clone()),
            etag: Some(self.etag.clone()),
            last_modified: Some(self.last_modified),
            metadata: self.params.metadata.clone(),
        }
    }
}

struct PendingUpload {
    key: ResolvedKey,
    params: ObjectParams,
    parts: BTreeMap<i32, (Bytes, String)>,
}

#[derive(Default)]
struct State {
    objects: HashMap<ResolvedKey, StoredObject>,
    uploads: HashMap<String, PendingUpload>,
    aborted: Vec<String>,
    fail_put: bool,
    fail_parts: HashSet<i32>,
    fail_complete: bool,
    abort_delay: Option<Duration>,
    requests: usize,
    next_upload: u64,
}

/// Memory-backed [`ObjectBackend`] for tests and local development
pub struct MemoryBackend {
    bucket: String,
    signing: SigningKey,
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            signing: SigningKey {
                access_key: "memory".into(),
                secret_key: "memory-secret".into(),
                region: stowkey_core::DEFAULT_REGION.into(),
            },
            state: Mutex::new(State::default()),
        }
    }

    /// Sign with the bucket and credentials of `config`
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            bucket: config.bucket.clone(),
            signing: SigningKey {
                access_key: config.access_key_id.clone(),
                secret_key: config.secret_access_key.clone(),
                region: config.region.clone(),
            },
            state: Mutex::new(State::default()),
        })
    }

    /// Path-style URL of the bucket
    pub fn bucket_url(&self) -> String {
        format!("{}/{}", ENDPOINT, self.bucket)
    }

    /// Make single-request puts fail
    pub fn fail_put(&self) {
        self.state.lock().fail_put = true;
    }

    /// Make every upload of part `part_number` fail
    pub fn fail_part(&self, part_number: i32) {
        self.state.lock().fail_parts.insert(part_number);
    }

    /// Make multipart completion fail
    pub fn fail_complete(&self) {
        self.state.lock().fail_complete = true;
    }

    /// Make every abort wait `delay` before it takes effect
    pub fn delay_aborts(&self, delay: Duration) {
        self.state.lock().abort_delay = Some(delay);
    }

    /// Multipart uploads created but neither completed nor aborted
    pub fn pending_uploads(&self) -> usize {
        self.state.lock().uploads.len()
    }

    /// Upload IDs aborted so far, in order
    pub fn aborted_uploads(&self) -> Vec<String> {
        self.state.lock().aborted.clone()
    }

    /// Backend calls served so far
    pub fn request_count(&self) -> usize {
        self.state.lock().requests
    }

    pub fn contains(&self, key: &str) -> bool {
        ResolvedKey::from_stored(key)
            .map(|key| self.state.lock().objects.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn object_acl(&self, key: &str) -> Option<CannedAcl> {
        let key = ResolvedKey::from_stored(key).ok()?;
        self.state.lock().objects.get(&key).map(|o| o.params.acl)
    }

    /// Check a request against a URL issued by [`ObjectBackend::presign`],
    /// returning the key it grants access to
    pub fn verify_presigned(
        &self,
        method: &str,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<ResolvedKey> {
        let path = sigv4::verify(method, url, headers, &self.signing, Utc::now())?;
        let bucket_path = format!("/{}/", self.bucket);
        let object = path
            .strip_prefix(&bucket_path)
            .ok_or(Error::SignatureDoesNotMatch)?;
        let object = percent_decode_str(object)
            .decode_utf8()
            .map_err(|e| Error::InvalidArgument(format!("Invalid URL path: {}", e)))?;

        ResolvedKey::from_backend_key(&object)
    }

    /// Perform the upload a client would make with a signed PUT URL
    pub fn put_presigned(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        data: Bytes,
    ) -> Result<ResolvedKey> {
        let key = self.verify_presigned("PUT", url, headers)?;
        let header = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.to_string())
        };

        let params = ObjectParams {
            acl: match header("x-amz-acl") {
                Some(acl) => acl.parse().map_err(Error::InvalidArgument)?,
                None => CannedAcl::Private,
            },
            content_type: header("content-type").unwrap_or_else(|| DEFAULT_CONTENT_TYPE.into()),
            ..Default::default()
        };

        self.store(&key, params, data);
        Ok(key)
    }

    /// Download through a signed GET URL
    pub fn get_presigned(&self, url: &str) -> Result<Bytes> {
        let key = self.verify_presigned("GET", url, &[])?;
        self.state
            .lock()
            .objects
            .get(&key)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NoSuchKey(key.into_string()))
    }

    fn store(&self, key: &ResolvedKey, params: ObjectParams, data: Bytes) -> String {
        let etag = format!("\"{}\"", md5_hex(&data));
        info!("Stored {} ({} bytes) in memory bucket {}", key, data.len(), self.bucket);
        self.state.lock().objects.insert(
            key.clone(),
            StoredObject {
                data,
                params,
                etag: etag.clone(),
                last_modified: Utc::now(),
            },
        );
        etag
    }

    fn request(&self) -> parking_lot::MutexGuard<'_, State> {
        let mut state = self.state.lock();
        state.requests += 1;
        state
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryBackend")
            .field("bucket", &self.bucket)
            .field("objects", &state.objects.len())
            .field("uploads", &state.uploads.len())
            .finish()
    }
}

fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Format: MD5(concat(part md5s))-part_count
fn multipart_etag(part_etags: &[&str]) -> String {
    let mut hasher = Md5::new();
    for etag in part_etags {
        if let Ok(bytes) = hex::decode(etag.trim_matches('"')) {
            hasher.update(&bytes);
        }
    }
    format!("\"{}-{}\"", hex::encode(hasher.finalize()), part_etags.len())
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &ResolvedKey,
        params: &ObjectParams,
        data: Bytes,
    ) -> Result<Option<String>> {
        if self.request().fail_put {
            return Err(Error::backend("put_object", "injected put failure"));
        }
        Ok(Some(self.store(key, params.clone(), data)))
    }

    async fn create_multipart_upload(
        &self,
        key: &ResolvedKey,
        params: &ObjectParams,
    ) -> Result<String> {
        let mut state = self.request();
        state.next_upload += 1;
        let upload_id = format!("upload-{}", state.next_upload);
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                key: key.clone(),
                params: params.clone(),
                parts: BTreeMap::new(),
            },
        );
        debug!("Created multipart upload {} for {}", upload_id, key);
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &ResolvedKey,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<CompletedPart> {
        let mut state = self.request();
        if state.fail_parts.contains(&part_number) {
            return Err(Error::backend(
                "upload_part",
                format!("injected failure for part {}", part_number),
            ));
        }

        let upload = state
            .uploads
            .get_mut(upload_id)
            .filter(|u| &u.key == key)
            .ok_or_else(|| Error::NoSuchUpload(upload_id.to_string()))?;

        let etag = format!("\"{}\"", md5_hex(&data));
        upload.parts.insert(part_number, (data, etag.clone()));

        Ok(CompletedPart {
            part_number,
            etag: Some(etag),
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &ResolvedKey,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<Option<String>> {
        let (params, data, etag) = {
            let mut state = self.request();
            if state.fail_complete {
                return Err(Error::backend(
                    "complete_multipart_upload",
                    "injected completion failure",
                ));
            }

            let upload = state
                .uploads
                .get(upload_id)
                .filter(|u| &u.key == key)
                .ok_or_else(|| Error::NoSuchUpload(upload_id.to_string()))?;

            if parts.is_empty() {
                return Err(Error::InvalidArgument(
                    "multipart upload needs at least one part".into(),
                ));
            }

            let mut data = BytesMut::new();
            let mut etags = Vec::with_capacity(parts.len());
            let mut previous = 0;
            for part in &parts {
                if part.part_number <= previous {
                    return Err(Error::InvalidArgument(
                        "parts must be listed in ascending order".into(),
                    ));
                }
                previous = part.part_number;

                let (bytes, etag) = upload.parts.get(&part.part_number).ok_or_else(|| {
                    Error::InvalidArgument(format!("part {} was not uploaded", part.part_number))
                })?;
                if part.etag.as_deref().is_some_and(|e| e != etag) {
                    return Err(Error::InvalidArgument(format!(
                        "ETag mismatch for part {}",
                        part.part_number
                    )));
                }
                data.extend_from_slice(bytes);
                etags.push(etag.as_str());
            }

            let etag = multipart_etag(&etags);
            let params = upload.params.clone();
            state.uploads.remove(upload_id);
            (params, data.freeze(), etag)
        };

        info!("Completed multipart upload {} for {}", upload_id, key);
        let mut state = self.state.lock();
        state.objects.insert(
            key.clone(),
            StoredObject {
                data,
                params,
                etag: etag.clone(),
                last_modified: Utc::now(),
            },
        );
        Ok(Some(etag))
    }

    async fn abort_multipart_upload(&self, key: &ResolvedKey, upload_id: &str) -> Result<()> {
        let delay = self.state.lock().abort_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.request();
        match state.uploads.get(upload_id) {
            Some(upload) if &upload.key == key => {
                state.uploads.remove(upload_id);
                state.aborted.push(upload_id.to_string());
                debug!("Aborted multipart upload {} for {}", upload_id, key);
                Ok(())
            }
            _ => Err(Error::NoSuchUpload(upload_id.to_string())),
        }
    }

    async fn head_object(&self, key: &ResolvedKey) -> Result<ObjectInfo> {
        self.request()
            .objects
            .get(key)
            .map(|o| o.info(key))
            .ok_or_else(|| Error::NoSuchKey(key.to_string()))
    }

    async fn get_object(&self, key: &ResolvedKey) -> Result<ObjectBody> {
        let state = self.request();
        let object = state
            .objects
            .get(key)
            .ok_or_else(|| Error::NoSuchKey(key.to_string()))?;

        let data = object.data.clone();
        let stream: BodyStream = futures::stream::iter([Ok(data)]).boxed();

        Ok(ObjectBody {
            info: object.info(key),
            stream,
        })
    }

    async fn delete_object(&self, key: &ResolvedKey) -> Result<()> {
        // S3 semantics: deleting a missing key succeeds
        self.request().objects.remove(key);
        Ok(())
    }

    async fn presign(&self, request: &PresignRequest) -> Result<SignedUrl> {
        drop(self.request());
        sigv4::presign(request, &self.bucket_url(), &self.signing, Utc::now())
    }
}
