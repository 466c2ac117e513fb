//! On-image layout constants.
//!
//! Disk layout:
//! [ superblock | inode table | block bitmap | data blocks ]
//!
//! These values are the reference configuration: they are chosen so the four
//! regions fit inside [`FS_SIZE`] without overlap. A host embedding this crate
//! with different capacity needs would change these constants and recompute
//! the derived offsets below.

use core::mem;

/// Size of a single data block, in bytes.
pub const BLOCK_SIZE: usize = 256;
/// Size of a single on-image inode record, in bytes.
pub const INODE_SIZE: usize = 64;
/// Number of inode slots in the inode table (slot 0 is always the root).
pub const INODE_COUNT: usize = 1024;
/// Number of data blocks backing the image.
pub const TOTAL_BLOCKS: usize = 7928;
/// Number of bytes in the block bitmap (one bit per block).
pub const BITMAP_BYTES: usize = TOTAL_BLOCKS / 8;

/// Number of direct block pointers per inode.
pub const NUM_DIRECT: usize = 8;
/// Number of block numbers held by a single indirect block.
pub const PTRS_PER_BLOCK: usize = BLOCK_SIZE / mem::size_of::<i32>();
/// Maximum number of logical data blocks addressable by one inode.
pub const MAX_BLOCKS_PER_FILE: usize =
    NUM_DIRECT + PTRS_PER_BLOCK + PTRS_PER_BLOCK * PTRS_PER_BLOCK;
/// Maximum file size in bytes.
pub const MAX_FILE_SIZE: usize = MAX_BLOCKS_PER_FILE * BLOCK_SIZE;

/// Number of 16-byte directory entries held by one directory block.
pub const DIRENTS_PER_BLOCK: usize = BLOCK_SIZE / DIRENT_SIZE;

/// Inode number of the root directory. Always allocated, never freed.
pub const ROOT_INODE: u16 = 0;

/// Number of file-descriptor slots in one client's open-file table.
pub const MAX_OPEN_FILES: usize = 128;

/// Sentinel stored in an unused block-pointer slot.
pub const NO_BLOCK: i32 = -1;

/// Maximum length of a path segment (file or directory name), NUL excluded.
pub const NAME_MAX: usize = 13;
/// Size in bytes of the `name` field of an inode record, NUL included.
pub const INODE_NAME_SIZE: usize = 14;
/// Size in bytes of the `type` field of an inode record, NUL included.
pub const INODE_TYPE_SIZE: usize = 4;

/// Size in bytes of one directory entry: 14-byte name + 2-byte inode number.
pub const DIRENT_SIZE: usize = 16;
/// Size in bytes of the `name` field of a directory entry, NUL included.
pub const DIRENT_NAME_SIZE: usize = 14;

// ----- superblock -----
pub const SUPERBLOCK_OFFSET: usize = 0;
pub const SUPERBLOCK_SIZE: usize = 8;

// ----- inode table -----
pub const INODE_TABLE_OFFSET: usize = SUPERBLOCK_OFFSET + SUPERBLOCK_SIZE;
pub const INODE_TABLE_SIZE: usize = INODE_COUNT * INODE_SIZE;

// ----- block bitmap -----
pub const BITMAP_OFFSET: usize = INODE_TABLE_OFFSET + INODE_TABLE_SIZE;

// ----- data blocks -----
pub const DATA_OFFSET: usize = BITMAP_OFFSET + BITMAP_BYTES;

/// Total size of the image, in bytes.
pub const FS_SIZE: usize = DATA_OFFSET + TOTAL_BLOCKS * BLOCK_SIZE;

// ----- inode record field offsets (within one INODE_SIZE slot) -----
pub const INODE_OFF_TYPE: usize = 0;
pub const INODE_OFF_SIZE: usize = 4;
pub const INODE_OFF_FILE_COUNT: usize = 8;
pub const INODE_OFF_NAME: usize = 10;
pub const INODE_OFF_DIRECT: usize = 24;
pub const INODE_OFF_SINGLE_INDIRECT: usize = 56;
pub const INODE_OFF_DOUBLE_INDIRECT: usize = 60;

const _: () = assert!(INODE_OFF_DOUBLE_INDIRECT + 4 <= INODE_SIZE);
const _: () = assert!(DIRENT_SIZE == DIRENT_NAME_SIZE + 2);
const _: () = assert!(BLOCK_SIZE % DIRENT_SIZE == 0);
const _: () = assert!(TOTAL_BLOCKS % 8 == 0);
