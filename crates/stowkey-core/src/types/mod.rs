//! Core types for Stowkey

mod acl;
mod object;
mod presigned;

pub use acl::*;
pub use object::*;
pub use presigned::*;
