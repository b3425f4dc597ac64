//! FUSE binding for a chunk tree VFS.
//!
//! Translates inode-based FUSE requests into path-based [`VfsOps`] calls.
//! Inodes come from [`crate::inode`], so the adapter keeps no tables and no
//! open-file state: each request names its node by path again.

use std::ffi::OsStr;
use std::os::raw::c_int;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chunkfs_kernel::{ChunkAddress, FileAttr, FileType, OpenFlags, VfsError, VfsOps};
use fuser::{ReplyAttr, ReplyData, ReplyDirectory, ReplyEntry, ReplyOpen, Request};
use tokio::runtime::Handle;

use crate::inode;

/// Default attribute/entry cache timeout.
pub const DEFAULT_TTL: Duration = Duration::from_secs(1);

/// Block size reported to the kernel.
const BLKSIZE: u32 = 512;

/// Read-only FUSE filesystem over any [`VfsOps`] laid out as a chunk tree.
pub struct ChunkFuse<V> {
    fs: Arc<V>,
    runtime: Handle,
    ttl: Duration,
}

impl<V: VfsOps> ChunkFuse<V> {
    /// Create an adapter that runs VFS calls on `runtime`.
    ///
    /// FUSE callbacks block on the runtime, so they must not themselves run
    /// on one of its worker threads.
    pub fn new(fs: Arc<V>, runtime: Handle) -> Self {
        Self {
            fs,
            runtime,
            ttl: DEFAULT_TTL,
        }
    }

    /// Set how long the kernel may cache attributes and lookups.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn address(ino: u64) -> Result<ChunkAddress, c_int> {
        inode::address_for(ino).ok_or(libc::ENOENT)
    }

    /// Attributes of `name` inside directory `parent`.
    pub fn lookup_attr(&self, parent: u64, name: &OsStr) -> Result<fuser::FileAttr, c_int> {
        let parent = Self::address(parent)?;
        let name = name.to_str().ok_or(libc::ENOENT)?;
        let path = child_path(&parent, name);
        let address = ChunkAddress::parse(&path).map_err(|_| libc::ENOENT)?;
        let ino = inode::ino_for(&address).ok_or(libc::ENOENT)?;

        let attr = self
            .runtime
            .block_on(self.fs.getattr(Path::new(&path)))
            .map_err(|e| errno("lookup", &path, e))?;
        Ok(to_fuse_attr(ino, &attr))
    }

    /// Attributes of the node behind `ino`.
    pub fn attr(&self, ino: u64) -> Result<fuser::FileAttr, c_int> {
        let path = Self::address(ino)?.to_string();
        let attr = self
            .runtime
            .block_on(self.fs.getattr(Path::new(&path)))
            .map_err(|e| errno("getattr", &path, e))?;
        Ok(to_fuse_attr(ino, &attr))
    }

    /// Directory listing of `ino` as `(inode, kind, name)`, `.` and `..` first.
    pub fn list(&self, ino: u64) -> Result<Vec<(u64, fuser::FileType, String)>, c_int> {
        let address = Self::address(ino)?;
        let path = address.to_string();
        let entries = self
            .runtime
            .block_on(self.fs.readdir(Path::new(&path)))
            .map_err(|e| errno("readdir", &path, e))?;

        let mut listing = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry_ino = match entry.name.as_str() {
                "." => Some(ino),
                ".." => inode::parent_ino(&address),
                name => ChunkAddress::parse(&child_path(&address, name))
                    .ok()
                    .and_then(|child| inode::ino_for(&child)),
            };
            let Some(entry_ino) = entry_ino else {
                tracing::warn!(path = %path, name = %entry.name, "entry without inode, skipped");
                continue;
            };
            listing.push((entry_ino, to_fuse_kind(entry.kind), entry.name));
        }
        Ok(listing)
    }

    /// Validate an open of `ino` with raw `open(2)` flags.
    pub fn check_open(&self, ino: u64, flags: i32) -> Result<(), c_int> {
        let path = Self::address(ino)?.to_string();
        self.runtime
            .block_on(self.fs.open(Path::new(&path), open_flags(flags)))
            .map_err(|e| errno("open", &path, e))
    }

    /// Up to `size` bytes of `ino` starting at `offset`.
    pub fn read_range(&self, ino: u64, offset: i64, size: u32) -> Result<Vec<u8>, c_int> {
        let offset = u64::try_from(offset).map_err(|_| libc::EINVAL)?;
        let path = Self::address(ino)?.to_string();
        self.runtime
            .block_on(self.fs.read(Path::new(&path), offset, size))
            .map_err(|e| errno("read", &path, e))
    }
}

impl<V: VfsOps> fuser::Filesystem for ChunkFuse<V> {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.lookup_attr(parent, name) {
            Ok(attr) => reply.entry(&self.ttl, &attr, 0),
            Err(code) => reply.error(code),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        match self.attr(ino) {
            Ok(attr) => reply.attr(&self.ttl, &attr),
            Err(code) => reply.error(code),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let listing = match self.list(ino) {
            Ok(listing) => listing,
            Err(code) => {
                reply.error(code);
                return;
            }
        };
        let start = offset.max(0) as usize;
        for (idx, (entry_ino, kind, name)) in listing.into_iter().enumerate().skip(start) {
            if reply.add(entry_ino, (idx + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        match self.check_open(ino, flags) {
            Ok(()) => reply.opened(0, 0),
            Err(code) => reply.error(code),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        match self.read_range(ino, offset, size) {
            Ok(data) => reply.data(&data),
            Err(code) => reply.error(code),
        }
    }
}

fn child_path(parent: &ChunkAddress, name: &str) -> String {
    if parent.is_root() {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Access mode of raw `open(2)` flags; status bits are ignored.
fn open_flags(flags: i32) -> OpenFlags {
    match flags & libc::O_ACCMODE {
        libc::O_RDONLY => OpenFlags::read(),
        libc::O_WRONLY => OpenFlags::write_only(),
        _ => OpenFlags::read_write(),
    }
}

/// POSIX error code for a VFS failure; logs anything but plain misses.
fn errno(op: &'static str, path: &str, err: VfsError) -> c_int {
    match err {
        VfsError::NotFound(_) => {
            tracing::trace!(op, path, "no such chunk node");
            libc::ENOENT
        }
        VfsError::NotADirectory(_) => libc::ENOTDIR,
        VfsError::IsADirectory(_) => libc::EISDIR,
        VfsError::ReadOnly => {
            tracing::debug!(op, path, "refused non-read-only open");
            libc::EROFS
        }
        VfsError::Io(e) => {
            tracing::warn!(op, path, error = %e, "backing image I/O failed");
            e.raw_os_error().unwrap_or(libc::EIO)
        }
    }
}

fn to_fuse_kind(kind: FileType) -> fuser::FileType {
    match kind {
        FileType::File => fuser::FileType::RegularFile,
        FileType::Directory => fuser::FileType::Directory,
    }
}

fn to_fuse_attr(ino: u64, attr: &FileAttr) -> fuser::FileAttr {
    fuser::FileAttr {
        ino,
        size: attr.size,
        blocks: attr.blocks,
        atime: attr.atime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        crtime: attr.ctime,
        kind: to_fuse_kind(attr.kind),
        perm: (attr.perm & 0o7777) as u16,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: BLKSIZE,
        flags: 0,
    }
}
