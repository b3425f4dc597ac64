//! Image geometry and path resolution.

use thiserror::Error;

use super::address::{ChunkAddress, PathError};
use crate::vfs::FileType;

/// Rejected chunk size / image size combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("chunk size must be at least one byte")]
    InvalidChunkSize,
    #[error("image of {0} bytes is larger than {max} bytes", max = Geometry::MAX_TOTAL_SIZE)]
    TooLarge(u64),
}

/// How an image is cut into chunks. Fixed for the life of a mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    chunk_size: u64,
    total_size: u64,
    chunk_count: u64,
}

/// A resolved node of the chunk tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkNode {
    pub address: ChunkAddress,
    /// `address.index() * chunk_size`.
    pub byte_offset: u64,
    pub kind: FileType,
    /// Chunk length for files, 0 for directories.
    pub size: u64,
}

impl ChunkNode {
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }
}

impl Geometry {
    /// Largest image accepted. Keeps every chunk index and byte offset in
    /// the signed 63-bit range.
    pub const MAX_TOTAL_SIZE: u64 = i64::MAX as u64;

    pub fn new(chunk_size: u64, total_size: u64) -> Result<Self, GeometryError> {
        if chunk_size == 0 {
            return Err(GeometryError::InvalidChunkSize);
        }
        if total_size > Self::MAX_TOTAL_SIZE {
            return Err(GeometryError::TooLarge(total_size));
        }
        Ok(Self {
            chunk_size,
            total_size,
            chunk_count: total_size.div_ceil(chunk_size),
        })
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    /// Whether any chunk lives at or under `address`. The root always exists.
    pub fn contains(&self, address: &ChunkAddress) -> bool {
        address.is_root() || address.index() < self.chunk_count
    }

    /// Length of chunk `index`: `chunk_size`, except possibly the last one.
    pub fn chunk_len(&self, index: u64) -> u64 {
        let offset = index.saturating_mul(self.chunk_size);
        self.chunk_size.min(self.total_size.saturating_sub(offset))
    }

    /// Resolve a path to its node.
    pub fn resolve(&self, path: &str) -> Result<ChunkNode, PathError> {
        self.node(ChunkAddress::parse(path)?)
    }

    /// Describe an already decoded address.
    pub fn node(&self, address: ChunkAddress) -> Result<ChunkNode, PathError> {
        if !self.contains(&address) {
            return Err(PathError::OutOfRange);
        }

        // index < chunk_count, so the product stays below total_size.
        let byte_offset = address.index() * self.chunk_size;
        let (kind, size) = if address.is_leaf() {
            (FileType::File, self.chunk_len(address.index()))
        } else {
            (FileType::Directory, 0)
        };

        Ok(ChunkNode {
            address,
            byte_offset,
            kind,
            size,
        })
    }

    /// Existing children of `address`, in ascending segment order.
    ///
    /// Children cover ascending index ranges, so the walk stops at the first
    /// one past the end of the image.
    pub fn children(&self, address: ChunkAddress) -> impl Iterator<Item = ChunkAddress> + '_ {
        (0..=u8::MAX)
            .map_while(move |segment| address.child(segment))
            .take_while(move |child| child.index() < self.chunk_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_path(index: u64) -> String {
        ChunkAddress::leaf(index).to_string()
    }

    #[test]
    fn test_new_validates() {
        assert_eq!(Geometry::new(0, 10), Err(GeometryError::InvalidChunkSize));
        assert_eq!(
            Geometry::new(1, u64::MAX),
            Err(GeometryError::TooLarge(u64::MAX))
        );
        let g = Geometry::new(10, 25).unwrap();
        assert_eq!(g.chunk_count(), 3);
        assert_eq!(Geometry::new(10, 30).unwrap().chunk_count(), 3);
        assert_eq!(Geometry::new(10, 0).unwrap().chunk_count(), 0);
        assert_eq!(
            Geometry::new(1, Geometry::MAX_TOTAL_SIZE).unwrap().chunk_count(),
            Geometry::MAX_TOTAL_SIZE
        );
    }

    #[test]
    fn test_resolve_every_chunk() {
        let g = Geometry::new(10, 25).unwrap();
        for i in 0..g.chunk_count() {
            let node = g.resolve(&leaf_path(i)).unwrap();
            assert!(node.is_file());
            assert_eq!(node.address.index(), i);
            assert_eq!(node.byte_offset, i * 10);
        }
        assert_eq!(g.resolve(&leaf_path(0)).unwrap().size, 10);
        assert_eq!(g.resolve(&leaf_path(2)).unwrap().size, 5);
    }

    #[test]
    fn test_resolve_past_end() {
        let g = Geometry::new(10, 25).unwrap();
        for i in [3, 4, 255, 256, u64::MAX] {
            assert_eq!(g.resolve(&leaf_path(i)), Err(PathError::OutOfRange));
        }
    }

    #[test]
    fn test_root_always_exists() {
        let empty = Geometry::new(4096, 0).unwrap();
        let root = empty.resolve("/").unwrap();
        assert!(root.is_dir());
        assert_eq!(root.size, 0);
        assert_eq!(root.byte_offset, 0);
        assert_eq!(empty.resolve("/00"), Err(PathError::OutOfRange));
        assert_eq!(empty.children(ChunkAddress::root()).count(), 0);
    }

    #[test]
    fn test_directories_exist_while_prefix_in_range() {
        // 0x1_0001 chunks: indices 0x0000..=0x1_0000.
        let g = Geometry::new(1, 0x1_0001).unwrap();
        let dir = g.resolve("/00/00/00/00/00/01").unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir.address.index(), 0x1_0000);
        assert_eq!(dir.byte_offset, 0x1_0000);
        assert!(g.resolve("/00/00/00/00/00/01/00").is_ok());
        assert_eq!(
            g.resolve("/00/00/00/00/00/01/01"),
            Err(PathError::OutOfRange)
        );
        assert_eq!(g.resolve("/00/00/00/00/00/02"), Err(PathError::OutOfRange));
        assert_eq!(g.resolve("/01"), Err(PathError::OutOfRange));
    }

    #[test]
    fn test_malformed_is_distinct_from_out_of_range() {
        let g = Geometry::new(10, 25).unwrap();
        assert_eq!(g.resolve("/00/0A"), Err(PathError::Malformed));
        assert_eq!(g.resolve("/00/00/00/00/00/00/00/"), Err(PathError::Malformed));
    }

    #[test]
    fn test_children_listing() {
        let g = Geometry::new(10, 25).unwrap();
        let leaf_dir = ChunkAddress::parse("/00/00/00/00/00/00/00").unwrap();
        let names: Vec<_> = g.children(leaf_dir).map(|c| c.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "/00/00/00/00/00/00/00/00",
                "/00/00/00/00/00/00/00/01",
                "/00/00/00/00/00/00/00/02",
            ]
        );
        let root_children: Vec<_> = g.children(ChunkAddress::root()).collect();
        assert_eq!(root_children, vec![ChunkAddress::root().child(0).unwrap()]);
        assert_eq!(g.children(ChunkAddress::leaf(0)).count(), 0);
    }

    #[test]
    fn test_children_full_fanout() {
        let g = Geometry::new(1, 300).unwrap();
        let dir = ChunkAddress::parse("/00/00/00/00/00/00/00").unwrap();
        let children: Vec<_> = g.children(dir).collect();
        assert_eq!(children.len(), 256);
        assert!(children.windows(2).all(|w| w[0] < w[1]));
        let next = ChunkAddress::parse("/00/00/00/00/00/00/01").unwrap();
        assert_eq!(g.children(next).count(), 300 - 256);
    }

    #[test]
    fn test_large_chunk_size_does_not_overflow() {
        let g = Geometry::new(u64::MAX, 10).unwrap();
        assert_eq!(g.chunk_count(), 1);
        let node = g.resolve(&leaf_path(0)).unwrap();
        assert_eq!(node.size, 10);
        assert_eq!(g.resolve(&leaf_path(1)), Err(PathError::OutOfRange));
        assert_eq!(g.chunk_len(5), 0);
    }
}
