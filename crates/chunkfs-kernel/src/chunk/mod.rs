//! The virtual chunk tree.
//!
//! Nothing here is stored: every node is decoded from its path and checked
//! against the image [`Geometry`] on demand.
//!
//! - [`ChunkAddress`] - a tree node, parsed from and printed as a path
//! - [`Geometry`] - chunk size, image size and chunk count
//! - [`ChunkNode`] - a resolved node with its byte offset, kind and size

mod address;
mod geometry;

pub use address::{ChunkAddress, MAX_LEVEL, MAX_PATH_LEN, PathError};
pub use geometry::{ChunkNode, Geometry, GeometryError};
