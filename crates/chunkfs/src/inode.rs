//! Inode numbers for chunk tree nodes.
//!
//! Inodes are computed from addresses, never allocated, so the tree stays
//! unmaterialized no matter how much of it the kernel has looked at.
//!
//! Level `L` (1..=8) owns the contiguous range `BASES[L] .. BASES[L] + 2^(8L-1)`,
//! offset by the node's prefix. A level-`L` prefix of a chunk index below
//! 2^63 is below 2^(8L-1), and the ranges of all eight levels together end
//! below 2^64, so every node of an image the kernel crate accepts has a
//! distinct inode.

use chunkfs_kernel::ChunkAddress;
use chunkfs_kernel::chunk::MAX_LEVEL;
use fuser::FUSE_ROOT_ID;

/// Inode of the root directory.
pub const ROOT_INO: u64 = FUSE_ROOT_ID;

const LEVELS: usize = MAX_LEVEL as usize + 1;

const BASES: [u64; LEVELS] = level_bases();

/// Number of inodes reserved for `level` (1..=8).
const fn level_width(level: usize) -> u64 {
    1u64 << (8 * level - 1)
}

const fn level_bases() -> [u64; LEVELS] {
    let mut bases = [ROOT_INO; LEVELS];
    bases[1] = ROOT_INO + 1;
    let mut level = 1;
    while level < MAX_LEVEL as usize {
        bases[level + 1] = bases[level] + level_width(level);
        level += 1;
    }
    bases
}

/// Inode for `address`, or `None` if its prefix is past 2^63 chunks.
pub fn ino_for(address: &ChunkAddress) -> Option<u64> {
    if address.is_root() {
        return Some(ROOT_INO);
    }
    let level = usize::from(address.level());
    let prefix = address.index() >> address.span_shift();
    if prefix >= level_width(level) {
        return None;
    }
    Some(BASES[level] + prefix)
}

/// Address behind `ino`, or `None` for numbers no node maps to.
pub fn address_for(ino: u64) -> Option<ChunkAddress> {
    if ino == ROOT_INO {
        return Some(ChunkAddress::root());
    }
    let level = (1..LEVELS).rev().find(|&level| ino >= BASES[level])?;
    let prefix = ino - BASES[level];
    if prefix >= level_width(level) {
        return None;
    }
    ChunkAddress::new(level as u8, prefix << (8 * (MAX_LEVEL as usize - level)))
}

/// Inode of the directory containing `address`; the root is its own parent.
pub fn parent_ino(address: &ChunkAddress) -> Option<u64> {
    match address.parent() {
        Some(parent) => ino_for(&parent),
        None => Some(ROOT_INO),
    }
}
