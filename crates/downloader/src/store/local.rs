use super::{BlobStore, BlobStoreError, ObjectMetadata, RemoteObject};
use crate::planner::ByteRange;
use bytes::Bytes;
use std::{
    io::{self, SeekFrom},
    path::{Component, Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncSeekExt},
};

/// A [`BlobStore`] backed by a directory on the local file-system.
///
/// Every sub-directory of `root` is a container, and keys are paths relative to their container.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: Box<Path>,
}

impl LocalBlobStore {
    /// Creates a new [`LocalBlobStore`] serving objects from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into().into_boxed_path() }
    }

    /// Resolves the file holding `object`, refusing anything that would escape `root`.
    fn object_path(&self, object: &RemoteObject) -> Result<PathBuf, BlobStoreError> {
        let relative = Path::new(&object.container).join(&object.key);
        let confined = relative.components().all(|c| matches!(c, Component::Normal(_)));

        if object.container.is_empty() || object.key.is_empty() || !confined {
            return Err(BlobStoreError::Other(format!("invalid object path {object}")))
        }

        Ok(self.root.join(relative))
    }
}

impl BlobStore for LocalBlobStore {
    async fn head_object(&self, object: &RemoteObject) -> Result<ObjectMetadata, BlobStoreError> {
        let path = self.object_path(object)?;
        let metadata = fs::metadata(&path).await.map_err(map_io)?;

        if !metadata.is_file() {
            return Err(BlobStoreError::NotFound)
        }

        Ok(ObjectMetadata { size: metadata.len() })
    }

    async fn get_object_range(
        &self,
        object: &RemoteObject,
        range: ByteRange,
    ) -> Result<Bytes, BlobStoreError> {
        let path = self.object_path(object)?;
        let mut file = File::open(&path).await.map_err(map_io)?;

        let len = usize::try_from(range.len())
            .map_err(|_| BlobStoreError::Other(format!("range {range} does not fit in memory")))?;
        let mut buf = vec![0; len];

        file.seek(SeekFrom::Start(range.start())).await.map_err(map_io)?;
        file.read_exact(&mut buf).await.map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => {
                BlobStoreError::Other(format!("range {range} is past the end of {object}"))
            }
            _ => map_io(err),
        })?;

        Ok(buf.into())
    }
}

fn map_io(err: io::Error) -> BlobStoreError {
    match err.kind() {
        io::ErrorKind::NotFound => BlobStoreError::NotFound,
        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut => {
            BlobStoreError::Transport(err.to_string())
        }
        _ => BlobStoreError::Other(err.to_string()),
    }
}
