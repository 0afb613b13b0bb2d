//! Access to remote objects through byte-range reads.

use crate::planner::ByteRange;
use bytes::Bytes;
use std::{fmt, future::Future};
use thiserror::Error;

mod http;
mod local;

pub use http::HttpBlobStore;
pub use local::LocalBlobStore;

/// An object in a blob store, addressed by its container and key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteObject {
    /// Bucket or container holding the object.
    pub container: String,
    /// Key of the object within the container. May contain `/` separated segments.
    pub key: String,
}

impl RemoteObject {
    /// Creates a new [`RemoteObject`].
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self { container: container.into(), key: key.into() }
    }
}

impl fmt::Display for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}

/// What a metadata probe reports about an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Total size of the object in bytes.
    pub size: u64,
}

/// Errors a [`BlobStore`] may return.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlobStoreError {
    /// The object does not exist.
    #[error("object not found")]
    NotFound,
    /// Connection failure, timeout or a service-side error.
    #[error("transport error: {0}")]
    Transport(String),
    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

/// A remote storage service exposing size probes and byte-range reads.
///
/// A single store is shared by all fetch tasks of a run, so implementations must support
/// concurrent calls through `&self`.
pub trait BlobStore: Send + Sync + 'static {
    /// Returns the metadata of `object`.
    fn head_object(
        &self,
        object: &RemoteObject,
    ) -> impl Future<Output = Result<ObjectMetadata, BlobStoreError>> + Send;

    /// Reads the bytes of `object` covered by `range`, both ends inclusive.
    fn get_object_range(
        &self,
        object: &RemoteObject,
        range: ByteRange,
    ) -> impl Future<Output = Result<Bytes, BlobStoreError>> + Send;
}
