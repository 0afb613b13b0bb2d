//! Persists fetched partitions, one file per partition.

use crate::{error::WriteError, planner::Partition};
use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};

/// Returns the name of the file `partition` is written to.
///
/// The name only depends on the byte range, so two partitions of a plan never share a file.
/// Offsets are zero padded, which makes lexical order match byte order.
pub fn partition_file_name(partition: &Partition) -> String {
    format!("part-{:020}-{:020}.bin", partition.range.start(), partition.range.end())
}

/// Name of the hidden file `partition` is staged in before it is renamed into place.
fn temp_file_name(partition: &Partition) -> String {
    format!(".{}.{}.tmp", partition_file_name(partition), partition.index)
}

/// Removes the staging files of partition writes that never completed from `root`.
///
/// A write that is aborted mid-way, for example because the process is shut down, can leave its
/// staging file behind. Finished partition files are never touched. Returns the number of files
/// removed; a missing `root` has none.
pub fn remove_temp_files(root: &Path) -> io::Result<usize> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err)
            if matches!(err.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) =>
        {
            return Ok(0)
        }
        Err(err) => return Err(err),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(".part-") && name.ends_with(".tmp") && entry.file_type()?.is_file() {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// A partition that has been persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenPartition {
    /// Final location of the partition file.
    pub path: PathBuf,
    /// Number of bytes written.
    pub bytes: u64,
}

/// Writes partition payloads below a destination root.
#[derive(Debug, Clone)]
pub struct PartitionWriter {
    root: Box<Path>,
}

impl PartitionWriter {
    /// Creates a writer placing partition files in `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into().into_boxed_path() }
    }

    /// The destination root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns where `partition` is written to.
    pub fn partition_path(&self, partition: &Partition) -> PathBuf {
        self.root.join(partition_file_name(partition))
    }

    /// Writes `payload` as the file of `partition`.
    ///
    /// The payload goes to a hidden temporary file next to the destination first, which is then
    /// renamed into place. The temporary file name includes the partition index, so even two
    /// partitions with the same range never share it. Either the complete file exists afterwards
    /// or an error is returned and nothing is left behind.
    pub async fn write(
        &self,
        partition: &Partition,
        payload: &[u8],
    ) -> Result<WrittenPartition, WriteError> {
        self.prepare_root().await?;

        let path = self.partition_path(partition);
        let tmp_path = self.root.join(temp_file_name(partition));

        if let Err(err) = write_and_rename(&tmp_path, &path, payload).await {
            if let Err(cleanup) = fs::remove_file(&tmp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        target: "rangefetch::writer",
                        path = ?tmp_path,
                        %cleanup,
                        "Failed to remove temporary file"
                    );
                }
            }
            return Err(err)
        }

        debug!(
            target: "rangefetch::writer",
            %partition,
            ?path,
            bytes = payload.len(),
            "Wrote partition"
        );

        Ok(WrittenPartition { path, bytes: payload.len() as u64 })
    }

    /// Checks that the root can hold files and creates it if it is missing.
    async fn prepare_root(&self) -> Result<(), WriteError> {
        if self.root.as_os_str().is_empty() {
            return Err(WriteError::PathConstruction {
                path: self.root.to_path_buf(),
                reason: "path is empty",
            })
        }

        match fs::metadata(&self.root).await {
            Ok(metadata) if !metadata.is_dir() => {
                return Err(WriteError::PathConstruction {
                    path: self.root.to_path_buf(),
                    reason: "not a directory",
                })
            }
            _ => {}
        }

        fs::create_dir_all(&self.root)
            .await
            .map_err(|err| WriteError::from_io(self.root.to_path_buf(), err))
    }
}

async fn write_and_rename(tmp_path: &Path, path: &Path, payload: &[u8]) -> Result<(), WriteError> {
    let io_err = |err: std::io::Error| WriteError::from_io(tmp_path.to_path_buf(), err);

    let mut file = File::create(tmp_path).await.map_err(io_err)?;
    file.write_all(payload).await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    drop(file);

    fs::rename(tmp_path, path).await.map_err(|err| WriteError::from_io(path.to_path_buf(), err))
}
