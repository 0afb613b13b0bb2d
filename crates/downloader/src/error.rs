use crate::store::{BlobStoreError, RemoteObject};
use std::{io, path::PathBuf};
use thiserror::Error;

/// Invalid input to the planner. Nothing is dispatched when planning fails.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    /// The object has no bytes to partition.
    #[error("invalid plan input: object size must be greater than zero")]
    EmptyObject,
    /// At least one partition is required.
    #[error("invalid plan input: worker count must be at least one")]
    NoWorkers,
}

/// Failure to read one partition from the blob store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The remote object does not exist.
    #[error("object not found")]
    ObjectNotFound,
    /// Network or service error. The partition may succeed if fetched again.
    #[error("transient transport error: {0}")]
    TransientTransport(String),
    /// Anything else, with as much detail as is available.
    #[error("unexpected error: {0}")]
    Unexpected(String),
    /// The run was cancelled before the partition was read.
    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether fetching the same partition again can succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientTransport(_) | Self::Cancelled)
    }
}

impl From<BlobStoreError> for FetchError {
    fn from(err: BlobStoreError) -> Self {
        match err {
            BlobStoreError::NotFound => Self::ObjectNotFound,
            BlobStoreError::Transport(msg) => Self::TransientTransport(msg),
            BlobStoreError::Other(msg) => Self::Unexpected(msg),
        }
    }
}

/// Failure to persist a fetched partition.
#[derive(Error, Debug)]
pub enum WriteError {
    /// The filesystem ran out of space.
    #[error("insufficient storage writing {0}")]
    InsufficientStorage(PathBuf),
    /// The destination is not writable.
    #[error("permission denied writing {0}")]
    PermissionDenied(PathBuf),
    /// The destination root cannot hold partition files.
    #[error("invalid destination root {path}: {reason}")]
    PathConstruction {
        /// The offending destination root.
        path: PathBuf,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// Any other I/O error.
    #[error("failed to write {path}: {source}")]
    Io {
        /// File or directory the operation was acting on.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

impl WriteError {
    /// Classifies an I/O error raised while operating on `path`.
    pub(crate) fn from_io(path: PathBuf, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::StorageFull => Self::InsufficientStorage(path),
            io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => {
                Self::PermissionDenied(path)
            }
            io::ErrorKind::NotADirectory => {
                Self::PathConstruction { path, reason: "a path component is not a directory" }
            }
            _ => Self::Io { path, source },
        }
    }
}

/// Why a single partition failed.
#[derive(Error, Debug)]
pub enum PartitionError {
    /// Reading the range from the blob store failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Persisting the fetched bytes failed.
    #[error(transparent)]
    Write(#[from] WriteError),
    /// The task handling the partition panicked.
    #[error("fetch task panicked: {0}")]
    Panicked(String),
}

impl PartitionError {
    /// Whether re-running the partition can succeed.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(err) => err.is_retryable(),
            Self::Write(_) | Self::Panicked(_) => false,
        }
    }
}

/// Errors that abort a run before any partition is dispatched.
#[derive(Error, Debug)]
pub enum RunError {
    /// The object size or worker count is invalid.
    #[error(transparent)]
    InvalidPlanInput(#[from] PlanError),
    /// The object to fetch does not exist.
    #[error("object {0} not found")]
    ObjectNotFound(RemoteObject),
    /// The run was cancelled while probing the object size.
    #[error("cancelled before any partition was dispatched")]
    Cancelled,
    /// The size probe failed for another reason.
    #[error("failed to probe {object}: {source}")]
    Probe {
        /// The probed object.
        object: RemoteObject,
        /// What went wrong.
        #[source]
        source: FetchError,
    },
}
