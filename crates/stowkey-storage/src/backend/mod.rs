//! Object store backends
//!
//! [`ObjectBackend`] is the seam between this layer and the store. Every
//! method takes a [`ResolvedKey`]; backends translate it to their own object
//! name (`ResolvedKey::to_backend_key`) and report failures unchanged.

mod memory;
mod s3;
mod sigv4;

pub use memory::MemoryBackend;
pub use s3::S3Backend;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use std::collections::HashMap;
use stowkey_core::types::{CannedAcl, ObjectInfo, PresignRequest, SignedUrl};
use stowkey_core::{ResolvedKey, Result};

/// Streaming object body
pub type BodyStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Attributes stored with a new object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectParams {
    pub acl: CannedAcl,
    pub content_type: String,
    pub cache_control: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// A part acknowledged by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: Option<String>,
}

/// Object content with its metadata
pub struct ObjectBody {
    pub info: ObjectInfo,
    pub stream: BodyStream,
}

impl ObjectBody {
    /// Read the whole body into memory
    pub async fn collect(self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.info.size as usize);
        let mut stream = self.stream;
        while let Some(chunk) = stream.try_next().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Object store operations used by the upload, signing and lifecycle paths
#[async_trait]
pub trait ObjectBackend: Send + Sync + 'static {
    /// Bucket this backend writes to
    fn bucket(&self) -> &str;

    /// Store a small object in one request, returning its ETag
    async fn put_object(
        &self,
        key: &ResolvedKey,
        params: &ObjectParams,
        data: Bytes,
    ) -> Result<Option<String>>;

    /// Start a multipart upload, returning its upload ID
    async fn create_multipart_upload(&self, key: &ResolvedKey, params: &ObjectParams)
        -> Result<String>;

    async fn upload_part(
        &self,
        key: &ResolvedKey,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<CompletedPart>;

    /// Assemble the parts; the object becomes visible only now
    async fn complete_multipart_upload(
        &self,
        key: &ResolvedKey,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<Option<String>>;

    /// Discard an unfinished multipart upload and its parts
    async fn abort_multipart_upload(&self, key: &ResolvedKey, upload_id: &str) -> Result<()>;

    async fn head_object(&self, key: &ResolvedKey) -> Result<ObjectInfo>;

    async fn get_object(&self, key: &ResolvedKey) -> Result<ObjectBody>;

    async fn delete_object(&self, key: &ResolvedKey) -> Result<()>;

    /// Issue a pre-signed URL for `request`
    async fn presign(&self, request: &PresignRequest) -> Result<SignedUrl>;
}
