//! Error types for Stowkey

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error coming from an object store client
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    // Validation Errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Object Errors
    #[error("The specified key does not exist: {0}")]
    NoSuchKey(String),

    #[error("The specified multipart upload does not exist: {0}")]
    NoSuchUpload(String),

    // Access Errors
    #[error("The request signature does not match")]
    SignatureDoesNotMatch,

    #[error("Request has expired")]
    ExpiredPresignedRequest,

    // Store Errors
    #[error("Backend error during {operation}: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Upload of {key} aborted: {source}")]
    UploadAborted {
        key: String,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Wrap an object store client failure, keeping it as the error source
    pub fn backend(operation: &'static str, err: impl Into<BoxError>) -> Self {
        Error::Backend {
            operation,
            source: err.into(),
        }
    }

    pub fn aborted(key: impl Into<String>, cause: Error) -> Self {
        Error::UploadAborted {
            key: key.into(),
            source: Box::new(cause),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "InvalidConfig",
            Error::InvalidKey(_) => "InvalidKey",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::NoSuchKey(_) => "NoSuchKey",
            Error::NoSuchUpload(_) => "NoSuchUpload",
            Error::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Error::ExpiredPresignedRequest => "AccessDenied",
            Error::Backend { .. } => "BackendError",
            Error::UploadAborted { .. } => "UploadAborted",
            Error::Io(_) => "InternalError",
            Error::Other(_) => "InternalError",
        }
    }

    /// Validation failures are raised before any request leaves the process
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig(_) | Error::InvalidKey(_) | Error::InvalidArgument(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NoSuchKey(_) => true,
            Error::UploadAborted { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::InvalidKey("users".into()).code(), "InvalidKey");
        assert_eq!(Error::ExpiredPresignedRequest.code(), "AccessDenied");
        assert_eq!(
            Error::aborted("/a.jpg", Error::NoSuchUpload("u1".into())).code(),
            "UploadAborted"
        );
    }

    #[test]
    fn test_backend_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = Error::backend("put_object", io);

        let source = std::error::Error::source(&err).unwrap();
        let io = source.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::ConnectionReset);
        assert!(err.to_string().contains("put_object"));
    }

    #[test]
    fn test_validation_classification() {
        assert!(Error::InvalidConfig("prefix".into()).is_validation());
        assert!(!Error::SignatureDoesNotMatch.is_validation());
        assert!(Error::NoSuchKey("/x".into()).is_not_found());
    }
}
