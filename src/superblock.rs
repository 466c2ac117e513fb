//! Superblock: free-block and free-inode counters.

use crate::image::Image;
use crate::layout::{SUPERBLOCK_OFFSET, TOTAL_BLOCKS};

const FREE_BLOCKS_OFF: usize = SUPERBLOCK_OFFSET;
const FREE_INODES_OFF: usize = SUPERBLOCK_OFFSET + 4;

/// Counters kept in the first 8 bytes of the image.
///
/// `free_blocks` must always equal the number of 0-bits in the block bitmap;
/// `free_inodes` must always equal the number of inode slots with an empty
/// `type` field. The bitmap and inode table are the sources of truth; this
/// struct is a cheap, denormalized cache of their free counts.
pub struct Superblock;

impl Superblock {
    /// Initializes the superblock counters: all blocks and all inodes but the
    /// root are free.
    pub fn init(image: &mut Image, inode_count: u32) {
        image.write_u32(FREE_BLOCKS_OFF, TOTAL_BLOCKS as u32);
        image.write_u32(FREE_INODES_OFF, inode_count - 1);
    }

    pub fn free_blocks(image: &Image) -> u32 {
        image.read_u32(FREE_BLOCKS_OFF)
    }

    pub fn free_inodes(image: &Image) -> u32 {
        image.read_u32(FREE_INODES_OFF)
    }

    pub(crate) fn inc_free_blocks(image: &mut Image, delta: i32) {
        let v = image.read_u32(FREE_BLOCKS_OFF) as i64 + delta as i64;
        image.write_u32(FREE_BLOCKS_OFF, v as u32);
    }

    pub(crate) fn inc_free_inodes(image: &mut Image, delta: i32) {
        let v = image.read_u32(FREE_INODES_OFF) as i64 + delta as i64;
        image.write_u32(FREE_INODES_OFF, v as u32);
    }
}
