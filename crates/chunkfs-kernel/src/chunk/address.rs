//! Chunk addresses and their path encoding.
//!
//! A chunk index is spelled as up to eight `/xx` segments, most significant
//! byte first, each segment two lowercase hex digits. A full eight-segment
//! path names one chunk; a shorter path names the directory holding every
//! chunk whose index starts with those bytes.

use std::fmt;

use thiserror::Error;

/// Level of the leaf (chunk) nodes: one segment per byte of a `u64`.
pub const MAX_LEVEL: u8 = 8;

/// Longest valid chunk path, eight `/xx` segments.
pub const MAX_PATH_LEN: usize = MAX_LEVEL as usize * 3;

/// Why a path failed to resolve.
///
/// Callers outside the resolver treat both variants as "does not exist".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    /// Wrong length, missing separator, or a digit outside `0-9a-f`.
    #[error("malformed chunk path")]
    Malformed,
    /// Well-formed, but no chunk of the image falls under it.
    #[error("chunk path beyond end of image")]
    OutOfRange,
}

/// A node of the virtual chunk tree.
///
/// `index` is always the full 64-bit value: the bytes past `level` are zero.
/// For a leaf it is the chunk index itself; for a directory it is the first
/// chunk index the directory covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkAddress {
    level: u8,
    index: u64,
}

impl ChunkAddress {
    /// The root directory.
    pub const fn root() -> Self {
        Self { level: 0, index: 0 }
    }

    /// The leaf for a chunk index.
    pub const fn leaf(index: u64) -> Self {
        Self {
            level: MAX_LEVEL,
            index,
        }
    }

    /// Build an address from a level and its prefix value.
    ///
    /// Returns `None` if the level is past the leaves or the prefix has bits
    /// set below its level.
    pub fn new(level: u8, index: u64) -> Option<Self> {
        if level > MAX_LEVEL || index & low_mask(level) != 0 {
            return None;
        }
        Some(Self { level, index })
    }

    /// Decode a path without consulting any image.
    ///
    /// Accepts `/` or one to eight `/xx` segments; anything else is
    /// [`PathError::Malformed`].
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path == "/" {
            return Ok(Self::root());
        }

        let bytes = path.as_bytes();
        if bytes.is_empty() || bytes.len() > MAX_PATH_LEN || bytes.len() % 3 != 0 {
            return Err(PathError::Malformed);
        }

        let mut be = [0u8; MAX_LEVEL as usize];
        for (slot, segment) in be.iter_mut().zip(bytes.chunks_exact(3)) {
            if segment[0] != b'/' {
                return Err(PathError::Malformed);
            }
            *slot = (nibble(segment[1])? << 4) | nibble(segment[2])?;
        }

        Ok(Self {
            level: (bytes.len() / 3) as u8,
            index: u64::from_be_bytes(be),
        })
    }

    /// Depth in the tree, 0 (root) through 8 (chunk).
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Prefix value (chunk index for leaves).
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn is_root(&self) -> bool {
        self.level == 0
    }

    pub fn is_leaf(&self) -> bool {
        self.level == MAX_LEVEL
    }

    /// Base-2 log of the number of chunk indices under this node.
    pub fn span_shift(&self) -> u32 {
        8 * u32::from(MAX_LEVEL - self.level)
    }

    /// The segment value this node adds to its parent's prefix.
    pub fn segment(&self) -> Option<u8> {
        if self.is_root() {
            return None;
        }
        Some((self.index >> self.span_shift()) as u8)
    }

    /// Enclosing directory; `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let level = self.level - 1;
        Some(Self {
            level,
            index: self.index & !low_mask(level),
        })
    }

    /// Child directory or chunk for one more segment; `None` below a leaf.
    pub fn child(&self, segment: u8) -> Option<Self> {
        if self.is_leaf() {
            return None;
        }
        let level = self.level + 1;
        let shift = 8 * u32::from(MAX_LEVEL - level);
        Some(Self {
            level,
            index: self.index | (u64::from(segment) << shift),
        })
    }
}

impl fmt::Display for ChunkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        let be = self.index.to_be_bytes();
        for byte in &be[..usize::from(self.level)] {
            write!(f, "/{byte:02x}")?;
        }
        Ok(())
    }
}

/// Bits of the index that must be zero at `level`.
fn low_mask(level: u8) -> u64 {
    match 8 * u32::from(MAX_LEVEL - level) {
        64 => u64::MAX,
        shift => (1u64 << shift) - 1,
    }
}

fn nibble(c: u8) -> Result<u8, PathError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        _ => Err(PathError::Malformed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root() {
        let root = ChunkAddress::parse("/").unwrap();
        assert!(root.is_root());
        assert_eq!(root.index(), 0);
        assert_eq!(root.to_string(), "/");
    }

    #[test]
    fn test_parse_leaf_is_big_endian() {
        let addr = ChunkAddress::parse("/00/00/00/00/00/00/01/02").unwrap();
        assert!(addr.is_leaf());
        assert_eq!(addr.index(), 0x0102);

        let addr = ChunkAddress::parse("/ff/ee/dd/cc/bb/aa/99/88").unwrap();
        assert_eq!(addr.index(), 0xffee_ddcc_bbaa_9988);
    }

    #[test]
    fn test_parse_prefix_fills_high_bytes() {
        let addr = ChunkAddress::parse("/ab/cd/ef").unwrap();
        assert_eq!(addr.level(), 3);
        assert_eq!(addr.index(), 0xabcd_ef00_0000_0000);
        assert_eq!(addr.span_shift(), 40);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for path in [
            "",
            "//",
            "/0",
            "/000",
            "/0g",
            "/AB",
            "/ab/",
            "ab/cd",
            "/ab:cd",
            "/ab/cd/ef/01/23/45/67/89/ab",
            "/ -1",
            "/é",
        ] {
            assert_eq!(
                ChunkAddress::parse(path),
                Err(PathError::Malformed),
                "{path:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_display_round_trips() {
        for path in ["/", "/00", "/7f/00", "/01/02/03/04/05/06/07/08"] {
            assert_eq!(ChunkAddress::parse(path).unwrap().to_string(), path);
        }
        assert_eq!(ChunkAddress::leaf(3).to_string(), "/00/00/00/00/00/00/00/03");
    }

    #[test]
    fn test_parent_and_child() {
        let leaf = ChunkAddress::leaf(0x0102_0304_0506_0708);
        let parent = leaf.parent().unwrap();
        assert_eq!(parent.to_string(), "/01/02/03/04/05/06/07");
        assert_eq!(parent.child(0x08), Some(leaf));
        assert_eq!(leaf.segment(), Some(0x08));
        assert!(leaf.child(0).is_none());

        let first = ChunkAddress::root().child(0xab).unwrap();
        assert_eq!(first.to_string(), "/ab");
        assert_eq!(first.parent(), Some(ChunkAddress::root()));
        assert!(ChunkAddress::root().parent().is_none());
    }

    #[test]
    fn test_new_rejects_stray_low_bits() {
        assert!(ChunkAddress::new(0, 0).is_some());
        assert!(ChunkAddress::new(0, 1).is_none());
        assert!(ChunkAddress::new(1, 0xab00_0000_0000_0000).is_some());
        assert!(ChunkAddress::new(1, 0xab00_0000_0000_0001).is_none());
        assert!(ChunkAddress::new(8, u64::MAX).is_some());
        assert!(ChunkAddress::new(9, 0).is_none());
    }
}
