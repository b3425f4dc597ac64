//! Chunk tree backend.
//!
//! Serves the virtual chunk tree of a [`BackingImage`]. Attributes are
//! borrowed from the image itself; reads are single positioned reads.

use async_trait::async_trait;
use std::fs::Metadata;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::chunk::{ChunkNode, Geometry};
use crate::image::BackingImage;
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::VfsOps;
use crate::vfs::types::{DirEntry, FileAttr, FileType, OpenFlags};

/// Link count reported for every directory: 256 children, `.` and `..`.
pub const DIR_NLINK: u32 = 256 + 2;

const EXEC_BITS: u32 = 0o111;
const READ_BITS: u32 = 0o444;

/// Read-only chunk tree over a shared backing image.
///
/// Holds nothing but the image, so clones are cheap and every operation can
/// run concurrently.
#[derive(Debug, Clone)]
pub struct ChunkBackend {
    image: Arc<BackingImage>,
}

impl ChunkBackend {
    pub fn new(image: Arc<BackingImage>) -> Self {
        Self { image }
    }

    pub fn geometry(&self) -> &Geometry {
        self.image.geometry()
    }

    /// Run `op` against the image on tokio's blocking pool.
    async fn blocking<T, F>(&self, op: F) -> VfsResult<T>
    where
        F: FnOnce(&BackingImage) -> io::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let image = Arc::clone(&self.image);
        tokio::task::spawn_blocking(move || op(&image))
            .await
            .map_err(|e| VfsError::Io(io::Error::other(e)))?
            .map_err(VfsError::from)
    }

    /// Resolve a path; every failure is reported as not found.
    fn resolve(&self, path: &Path) -> VfsResult<ChunkNode> {
        let Some(text) = path.to_str() else {
            return Err(VfsError::not_found(path.to_string_lossy()));
        };
        self.geometry().resolve(text).map_err(|e| {
            tracing::trace!(path = text, error = %e, "unresolvable chunk path");
            VfsError::not_found(text)
        })
    }

    /// Attributes of `node`, derived from the image's own metadata.
    fn node_attr(node: &ChunkNode, meta: &Metadata) -> FileAttr {
        let mut perm = meta.mode() & 0o7777 & !EXEC_BITS;
        let (nlink, size) = match node.kind {
            FileType::Directory => {
                // Read implies traverse.
                perm |= (perm & READ_BITS) >> 2;
                (DIR_NLINK, 0)
            }
            FileType::File => (1, node.size),
        };

        FileAttr {
            size,
            blocks: 0,
            kind: node.kind,
            perm,
            nlink,
            uid: meta.uid(),
            gid: meta.gid(),
            atime: unix_time(meta.atime(), meta.atime_nsec()),
            mtime: unix_time(meta.mtime(), meta.mtime_nsec()),
            ctime: unix_time(meta.ctime(), meta.ctime_nsec()),
        }
    }
}

fn unix_time(secs: i64, nsecs: i64) -> SystemTime {
    let nanos = Duration::from_nanos(nsecs.clamp(0, 999_999_999) as u64);
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64) + nanos
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + nanos
    }
}

#[async_trait]
impl VfsOps for ChunkBackend {
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let node = self.resolve(path)?;
        let meta = self.blocking(|image| image.metadata()).await?;
        Ok(Self::node_attr(&node, &meta))
    }

    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let node = self.resolve(path)?;
        if !node.is_dir() {
            return Err(VfsError::not_a_directory(path.to_string_lossy()));
        }

        let mut entries = vec![DirEntry::directory("."), DirEntry::directory("..")];
        entries.extend(
            self.geometry()
                .children(node.address)
                .filter_map(|child| {
                    let name = format!("{:02x}", child.segment()?);
                    Some(if child.is_leaf() {
                        DirEntry::file(name)
                    } else {
                        DirEntry::directory(name)
                    })
                }),
        );

        tracing::trace!(path = %path.display(), count = entries.len() - 2, "listed chunk directory");
        Ok(entries)
    }

    async fn open(&self, path: &Path, flags: OpenFlags) -> VfsResult<()> {
        if !flags.is_read_only() {
            return Err(VfsError::ReadOnly);
        }
        self.resolve(path)?;
        Ok(())
    }

    async fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        let node = self.resolve(path)?;
        if node.is_dir() {
            return Err(VfsError::is_a_directory(path.to_string_lossy()));
        }
        if offset >= node.size {
            return Ok(Vec::new());
        }

        let len = (node.size - offset).min(u64::from(size)) as usize;
        let position = node.byte_offset + offset;

        let data = self
            .blocking(move |image| {
                let mut buffer = vec![0u8; len];
                let bytes_read = image.read_at(position, &mut buffer)?;
                buffer.truncate(bytes_read);
                Ok(buffer)
            })
            .await?;

        tracing::trace!(
            path = %path.display(),
            offset,
            position,
            requested = size,
            returned = data.len(),
            "read chunk"
        );
        Ok(data)
    }
}
