//! S3 backend built on the AWS SDK

use super::{BodyStream, CompletedPart, ObjectBackend, ObjectBody, ObjectParams};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::presigning::{PresignedRequest, PresigningConfig};
use aws_sdk_s3::primitives::{ByteStream, DateTime as SmithyDateTime};
use aws_sdk_s3::types::{
    CompletedMultipartUpload, CompletedPart as S3CompletedPart, ObjectCannedAcl,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::HashMap;
use stowkey_core::types::{ObjectInfo, PresignRequest, SignOperation, SignedUrl};
use stowkey_core::{Error, ResolvedKey, Result, StorageConfig};
use tokio_util::io::ReaderStream;
use tracing::debug;

/// Backend talking to AWS S3 or any S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    /// Create an S3 client from configuration
    pub fn new(config: &StorageConfig) -> Result<Self> {
        config.validate()?;

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "stowkey",
        );

        let mut builder = S3ConfigBuilder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self::from_client(
            Client::from_conf(builder.build()),
            config.bucket.clone(),
        ))
    }

    /// Wrap an already configured client
    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn canned_acl(params: &ObjectParams) -> ObjectCannedAcl {
    ObjectCannedAcl::from(params.acl.as_str())
}

fn user_metadata(params: &ObjectParams) -> Option<HashMap<String, String>> {
    if params.metadata.is_empty() {
        None
    } else {
        Some(params.metadata.clone())
    }
}

fn to_chrono(dt: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(dt.secs(), dt.subsec_nanos())
}

fn signed_url(presigned: PresignedRequest, request: &PresignRequest) -> SignedUrl {
    let expires_at = Utc::now()
        + chrono::Duration::from_std(request.expires_in).unwrap_or_else(|_| chrono::Duration::zero());

    SignedUrl {
        url: presigned.uri().to_string(),
        method: presigned.method().to_string(),
        expires_at,
        headers: presigned
            .headers()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

#[async_trait]
impl ObjectBackend for S3Backend {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &ResolvedKey,
        params: &ObjectParams,
        data: Bytes,
    ) -> Result<Option<String>> {
        debug!("PutObject s3://{}/{} ({} bytes)", self.bucket, key.to_backend_key(), data.len());

        let resp = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key.to_backend_key())
            .acl(canned_acl(params))
            .content_type(&params.content_type)
            .set_cache_control(params.cache_control.clone())
            .set_metadata(user_metadata(params))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Error::backend("put_object", e))?;

        Ok(resp.e_tag().map(str::to_string))
    }

    async fn create_multipart_upload(
        &self,
        key: &ResolvedKey,
        params: &ObjectParams,
    ) -> Result<String> {
        let resp = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key.to_backend_key())
            .acl(canned_acl(params))
            .content_type(&params.content_type)
            .set_cache_control(params.cache_control.clone())
            .set_metadata(user_metadata(params))
            .send()
            .await
            .map_err(|e| Error::backend("create_multipart_upload", e))?;

        resp.upload_id()
            .map(str::to_string)
            .ok_or_else(|| Error::backend("create_multipart_upload", "missing upload ID"))
    }

    async fn upload_part(
        &self,
        key: &ResolvedKey,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<CompletedPart> {
        debug!(
            "UploadPart s3://{}/{} part {} ({} bytes)",
            self.bucket,
            key.to_backend_key(),
            part_number,
            data.len()
        );

        let resp = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key.to_backend_key())
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Error::backend("upload_part", e))?;

        Ok(CompletedPart {
            part_number,
            etag: resp.e_tag().map(str::to_string),
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &ResolvedKey,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<Option<String>> {
        let parts = parts
            .into_iter()
            .map(|p| {
                S3CompletedPart::builder()
                    .set_e_tag(p.etag)
                    .part_number(p.part_number)
                    .build()
            })
            .collect();

        let multipart = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        let resp = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key.to_backend_key())
            .upload_id(upload_id)
            .multipart_upload(multipart)
            .send()
            .await
            .map_err(|e| Error::backend("complete_multipart_upload", e))?;

        Ok(resp.e_tag().map(str::to_string))
    }

    async fn abort_multipart_upload(&self, key: &ResolvedKey, upload_id: &str) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key.to_backend_key())
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| Error::backend("abort_multipart_upload", e))?;

        Ok(())
    }

    async fn head_object(&self, key: &ResolvedKey) -> Result<ObjectInfo> {
        let resp = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key.to_backend_key())
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(err) if err.is_not_found() => Error::NoSuchKey(key.to_string()),
                _ => Error::backend("head_object", e),
            })?;

        Ok(ObjectInfo {
            key: key.clone(),
            size: resp.content_length().unwrap_or(0).max(0) as u64,
            content_type: resp.content_type().map(str::to_string),
            etag: resp.e_tag().map(str::to_string),
            last_modified: resp.last_modified().and_then(to_chrono),
            metadata: resp.metadata().cloned().unwrap_or_default(),
        })
    }

    async fn get_object(&self, key: &ResolvedKey) -> Result<ObjectBody> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key.to_backend_key())
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(err) if err.is_no_such_key() => Error::NoSuchKey(key.to_string()),
                _ => Error::backend("get_object", e),
            })?;

        let info = ObjectInfo {
            key: key.clone(),
            size: resp.content_length().unwrap_or(0).max(0) as u64,
            content_type: resp.content_type().map(str::to_string),
            etag: resp.e_tag().map(str::to_string),
            last_modified: resp.last_modified().and_then(to_chrono),
            metadata: resp.metadata().cloned().unwrap_or_default(),
        };

        let stream: BodyStream = ReaderStream::new(resp.body.into_async_read()).boxed();

        Ok(ObjectBody { info, stream })
    }

    async fn delete_object(&self, key: &ResolvedKey) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key.to_backend_key())
            .send()
            .await
            .map_err(|e| Error::backend("delete_object", e))?;

        Ok(())
    }

    async fn presign(&self, request: &PresignRequest) -> Result<SignedUrl> {
        let presign_config = PresigningConfig::expires_in(request.expires_in)
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;
        let key = request.key.to_backend_key();

        let presigned = match request.operation {
            SignOperation::Get => self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(presign_config)
                .await
                .map_err(|e| Error::backend("presign_get_object", e))?,
            SignOperation::Put => self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .set_acl(request.acl.map(|acl| ObjectCannedAcl::from(acl.as_str())))
                .set_content_type(request.content_type.clone())
                .presigned(presign_config)
                .await
                .map_err(|e| Error::backend("presign_put_object", e))?,
        };

        Ok(signed_url(presigned, request))
    }
}
