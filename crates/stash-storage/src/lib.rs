//! Stash Storage Library
//!
//! Blob storage for uploaded content. The [`Storage`] trait is what the record
//! store talks to; [`LocalStorage`] keeps blobs on the local filesystem.
//!
//! # Layout
//!
//! - committed blobs: `{root}/blobs/{record_id}`
//! - in-progress uploads: `{root}/tmp/{random}.part`
//!
//! Blob keys are only ever produced by [`BlobKey::for_record`], so no client
//! supplied string reaches a filesystem path.

pub mod keys;
pub mod local;
pub mod traits;

pub use keys::BlobKey;
pub use local::LocalStorage;
pub use traits::{BlobReader, Storage, StorageError, StorageResult, WriteLimits};
