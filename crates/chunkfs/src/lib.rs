//! FUSE host binding for chunkfs.
//!
//! Mounts a [`chunkfs_kernel::ChunkBackend`] (or any other
//! [`chunkfs_kernel::VfsOps`] laid out as a chunk tree) through `fuser`.

pub mod cli;
pub mod fuse;
pub mod inode;
pub mod mount;

pub use cli::Args;
pub use fuse::{ChunkFuse, DEFAULT_TTL};
pub use mount::{DEFAULT_FSNAME, MountOptionError, mount, mount_options, parse_mount_options};
