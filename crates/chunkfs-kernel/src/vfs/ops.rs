//! VFS operations trait.
//!
//! This trait defines the read-only filesystem operations in a way that's
//! independent of the host binding (path-based, no inodes, explicit
//! offset/size, no open-handle state).

use async_trait::async_trait;
use std::path::Path;

use super::types::{DirEntry, FileAttr, OpenFlags};
use super::VfsResult;

/// Largest single read issued by [`VfsOps::read_all`].
const READ_ALL_PIECE: u32 = 1 << 20;

/// Core VFS operations trait.
///
/// All operations are path-based; the path is resolved again on every call.
/// Implementations hold only immutable state, so they are safe to call from
/// any number of threads at once.
#[async_trait]
pub trait VfsOps: Send + Sync {
    /// Get file attributes.
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr>;

    /// Read directory entries, `.` and `..` first.
    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>>;

    /// Check that `path` may be opened with `flags`.
    ///
    /// Nothing is retained; subsequent reads name the path again.
    async fn open(&self, path: &Path, flags: OpenFlags) -> VfsResult<()>;

    /// Read file contents.
    ///
    /// Reads up to `size` bytes starting at `offset`.
    /// Returns fewer bytes (possibly none) at end of file.
    async fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Read entire file contents.
    ///
    /// Convenience method that reads the whole file in pieces.
    async fn read_all(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let attr = self.getattr(path).await?;
        let mut data = Vec::new();
        loop {
            let piece = self.read(path, data.len() as u64, READ_ALL_PIECE).await?;
            if piece.is_empty() {
                break;
            }
            data.extend_from_slice(&piece);
            if data.len() as u64 >= attr.size {
                break;
            }
        }
        Ok(data)
    }
}
