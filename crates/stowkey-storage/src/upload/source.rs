//! Upload payload shapes

use crate::backend::BodyStream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use stowkey_core::{Error, Result};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// A whole payload already in memory
pub struct BufferSource {
    pub data: Bytes,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

/// A payload read incrementally
pub struct StreamSource {
    pub stream: BodyStream,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

/// A file received through a multipart form (multer style)
#[derive(Debug, Clone)]
pub struct FormFile {
    pub original_name: String,
    pub mimetype: Option<String>,
    pub data: Bytes,
}

/// What a deferred upload handle resolves to
pub struct ResolvedUpload {
    pub filename: String,
    pub mimetype: Option<String>,
    pub stream: BodyStream,
}

/// An upload handle whose name, type and content only become available
/// when awaited (GraphQL multipart uploads behave this way)
#[async_trait]
pub trait DeferredUpload: Send {
    async fn resolve(self: Box<Self>) -> Result<ResolvedUpload>;
}

/// Deferred upload of a local file, opened on resolve
#[derive(Debug, Clone)]
pub struct LazyFile {
    path: PathBuf,
    mimetype: Option<String>,
}

impl LazyFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            mimetype: None,
        }
    }

    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }
}

#[async_trait]
impl DeferredUpload for LazyFile {
    async fn resolve(self: Box<Self>) -> Result<ResolvedUpload> {
        let file = tokio::fs::File::open(&self.path).await?;
        let filename = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::InvalidArgument(format!("{} does not name a file", self.path.display()))
            })?;

        Ok(ResolvedUpload {
            filename,
            mimetype: self.mimetype,
            stream: ReaderStream::new(file).boxed(),
        })
    }
}

/// Deferred handle with caller-supplied name or type taking precedence
struct Overridden {
    inner: Box<dyn DeferredUpload>,
    filename: Option<String>,
    mimetype: Option<String>,
}

#[async_trait]
impl DeferredUpload for Overridden {
    async fn resolve(self: Box<Self>) -> Result<ResolvedUpload> {
        let mut resolved = self.inner.resolve().await?;
        if let Some(filename) = self.filename {
            resolved.filename = filename;
        }
        if self.mimetype.is_some() {
            resolved.mimetype = self.mimetype;
        }
        Ok(resolved)
    }
}

/// Payload of an upload
pub enum UploadSource {
    Buffer(BufferSource),
    Stream(StreamSource),
    Deferred(Box<dyn DeferredUpload>),
}

impl UploadSource {
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffer(BufferSource {
            data: data.into(),
            filename: None,
            content_type: None,
        })
    }

    pub fn from_form_file(file: FormFile) -> Self {
        Self::Buffer(BufferSource {
            data: file.data,
            filename: Some(file.original_name),
            content_type: file.mimetype,
        })
    }

    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self::from_stream(ReaderStream::new(reader))
    }

    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    {
        Self::Stream(StreamSource {
            stream: stream.boxed(),
            filename: None,
            content_type: None,
        })
    }

    pub fn deferred(upload: impl DeferredUpload + 'static) -> Self {
        Self::Deferred(Box::new(upload))
    }

    /// Name used for content type lookup
    pub fn with_filename(self, filename: impl Into<String>) -> Self {
        let filename = Some(filename.into());
        match self {
            Self::Buffer(source) => Self::Buffer(BufferSource { filename, ..source }),
            Self::Stream(source) => Self::Stream(StreamSource { filename, ..source }),
            Self::Deferred(inner) => Self::Deferred(Box::new(Overridden {
                inner,
                filename,
                mimetype: None,
            })),
        }
    }

    /// Content type reported by the source itself
    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        let content_type = Some(content_type.into());
        match self {
            Self::Buffer(source) => Self::Buffer(BufferSource {
                content_type,
                ..source
            }),
            Self::Stream(source) => Self::Stream(StreamSource {
                content_type,
                ..source
            }),
            Self::Deferred(inner) => Self::Deferred(Box::new(Overridden {
                inner,
                filename: None,
                mimetype: content_type,
            })),
        }
    }

    /// Turn any source shape into one body. Deferred handles are awaited here.
    pub(crate) async fn prepare(self) -> Result<PreparedBody> {
        match self {
            Self::Buffer(source) => Ok(PreparedBody {
                filename: source.filename,
                reported_type: source.content_type,
                stream: futures::stream::iter([Ok(source.data)]).boxed(),
            }),
            Self::Stream(source) => Ok(PreparedBody {
                filename: source.filename,
                reported_type: source.content_type,
                stream: source.stream,
            }),
            Self::Deferred(upload) => {
                let resolved = upload.resolve().await?;
                Ok(PreparedBody {
                    filename: Some(resolved.filename),
                    reported_type: resolved.mimetype,
                    stream: resolved.stream,
                })
            }
        }
    }
}

impl std::fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffer(source) => f
                .debug_struct("Buffer")
                .field("len", &source.data.len())
                .field("filename", &source.filename)
                .finish(),
            Self::Stream(source) => f
                .debug_struct("Stream")
                .field("filename", &source.filename)
                .finish_non_exhaustive(),
            Self::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// A source reduced to a byte stream plus the hints used for content typing
pub(crate) struct PreparedBody {
    pub filename: Option<String>,
    pub reported_type: Option<String>,
    pub stream: BodyStream,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::io::Write;

    async fn drain(stream: BodyStream) -> Vec<u8> {
        stream
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_form_file_keeps_name_and_type() {
        let source = UploadSource::from_form_file(FormFile {
            original_name: "me.jpg".into(),
            mimetype: Some("image/jpeg".into()),
            data: Bytes::from_static(b"jpeg"),
        });

        let body = source.prepare().await.unwrap();
        assert_eq!(body.filename.as_deref(), Some("me.jpg"));
        assert_eq!(body.reported_type.as_deref(), Some("image/jpeg"));
        assert_eq!(drain(body.stream).await, b"jpeg");
    }

    #[tokio::test]
    async fn test_reader_source() {
        let source = UploadSource::from_reader(&b"streamed bytes"[..]).with_filename("notes.txt");
        let body = source.prepare().await.unwrap();
        assert_eq!(body.filename.as_deref(), Some("notes.txt"));
        assert_eq!(body.reported_type, None);
        assert_eq!(drain(body.stream).await, b"streamed bytes");
    }

    #[tokio::test]
    async fn test_lazy_file_resolves_on_prepare() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"a,b\n1,2\n").unwrap();

        let source = UploadSource::deferred(LazyFile::new(file.path()));
        let body = source.prepare().await.unwrap();
        assert!(body.filename.as_deref().unwrap().ends_with(".csv"));
        assert_eq!(drain(body.stream).await, b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_deferred_overrides() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let source = UploadSource::deferred(LazyFile::new(file.path()).with_mimetype("text/csv"))
            .with_filename("report.csv")
            .with_content_type("text/plain");

        let body = source.prepare().await.unwrap();
        assert_eq!(body.filename.as_deref(), Some("report.csv"));
        assert_eq!(body.reported_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_lazy_file_missing() {
        let source = UploadSource::deferred(LazyFile::new("/definitely/not/here.bin"));
        assert!(matches!(source.prepare().await, Err(Error::Io(_))));
    }
}
