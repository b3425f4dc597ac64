//! Virtual Filesystem abstraction.
//!
//! This module exposes the chunk tree as a read-only, path-based VFS.
//! Key components:
//!
//! - [`VfsOps`] - Core trait for filesystem operations
//! - [`ChunkBackend`](backends::ChunkBackend) - Chunk tree over a backing image
//!
//! ## Design Decisions
//!
//! - **Path-based, no inodes**: Operations use paths, not inode numbers.
//!   The host binding handles inode ↔ path mapping.
//! - **Explicit offset/size**: Read takes offset and size, no handle state.
//! - **Stateless**: every call resolves its path again.

pub mod backends;
mod error;
mod ops;
mod types;

pub use backends::ChunkBackend;
pub use error::{VfsError, VfsResult};
pub use ops::VfsOps;
pub use types::{DirEntry, FileAttr, FileType, OpenFlags};
