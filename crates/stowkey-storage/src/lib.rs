//! Stowkey Storage
//!
//! Upload orchestration, signed URL issuance and object operations on top of
//! an S3-compatible store.
//!
//! ```text
//!   KeyBuilder ──► ObjectKey ──► PrefixResolver ──► ResolvedKey
//!                                                      │
//!                    ┌──────────────┬──────────────────┤
//!                    ▼              ▼                  ▼
//!                 Uploader   SignedUrlIssuer    head / get / delete
//!                    │              │                  │
//!                    └──────────────┴─────► ObjectBackend (S3 | memory)
//! ```

pub mod backend;
pub mod signer;
pub mod store;
pub mod upload;

pub use backend::{
    BodyStream, CompletedPart, MemoryBackend, ObjectBackend, ObjectBody, ObjectParams, S3Backend,
};
pub use signer::SignedUrlIssuer;
pub use store::ObjectStore;
pub use upload::{DeferredUpload, FormFile, LazyFile, ResolvedUpload, UploadSource, Uploader};
