//! # chunkfs-kernel
//!
//! Exposes one flat image as a read-only tree of fixed-size chunk files.
//!
//! Chunk `i` lives at the path spelling the eight bytes of `i` as `/xx`
//! segments, most significant first; `/00/00/00/00/00/00/01/02` is chunk
//! 258. Shorter paths are directories. Nothing is materialized: every request
//! decodes its path against the image [`Geometry`].
//!
//! - [`chunk`] - path ↔ chunk address encoding and resolution
//! - [`image`] - the backing file or block device
//! - [`vfs`] - attribute, listing, open and read operations

pub mod chunk;
pub mod image;
pub mod vfs;

pub use chunk::{ChunkAddress, ChunkNode, Geometry, GeometryError, PathError};
pub use image::{BackingImage, ImageError};
pub use vfs::{
    backends::ChunkBackend, DirEntry, FileAttr, FileType, OpenFlags, VfsError, VfsOps, VfsResult,
};
