//! VFS backends.
//!
//! Backends implement [`VfsOps`](super::VfsOps) for different storage types.

mod chunk;

pub use chunk::ChunkBackend;
