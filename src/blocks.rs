//! Block-list machinery: translates an inode's logical block indices to
//! physical block numbers through the direct / single-indirect /
//! double-indirect pointers.
//!
//! Blocks are only ever allocated through [`reserve`] (a file's whole
//! capacity, fixed at `create` time) or [`ensure_range`] growing a
//! directory by one more block; `write` on a regular file only maps
//! blocks that already exist. Growth is checked before it is performed:
//! both count how many new blocks a growth would consume and fail with
//! [`Error::NoSpace`] before touching the bitmap if the image cannot
//! satisfy it, so a growth that doesn't fit leaves the inode unchanged.

use std::collections::HashSet;

use crate::bitmap::Bitmap;
use crate::error::{Error, Result};
use crate::image::Image;
use crate::inode::Inode;
use crate::layout::{MAX_BLOCKS_PER_FILE, NO_BLOCK, NUM_DIRECT, PTRS_PER_BLOCK};

/// Where a logical block index lives in the pointer structure.
enum Location {
    Direct(usize),
    Single(usize),
    /// `(index into the double-indirect block, index into that index block)`
    Double(usize, usize),
}

fn locate(logical: usize) -> Location {
    if logical < NUM_DIRECT {
        return Location::Direct(logical);
    }
    let logical = logical - NUM_DIRECT;
    if logical < PTRS_PER_BLOCK {
        return Location::Single(logical);
    }
    let logical = logical - PTRS_PER_BLOCK;
    Location::Double(logical / PTRS_PER_BLOCK, logical % PTRS_PER_BLOCK)
}

/// Stamps every slot of a freshly allocated index block with [`NO_BLOCK`].
/// `Bitmap::alloc_block` only zero-fills, and a zeroed slot reads back as
/// physical block 0 rather than "unmapped" — every index block must be
/// sentinel-filled before any of its slots are read or written.
fn init_index_block(image: &mut Image, blk: u32) {
    for i in 0..PTRS_PER_BLOCK {
        image.write_indirect(blk, i, NO_BLOCK);
    }
}

/// Returns the physical block number backing logical block `logical`,
/// allocating any missing index/data blocks along the way when `alloc` is
/// true. Returns `Ok(None)` when `alloc` is false and the block is unmapped
/// (a hole).
fn map_block(image: &mut Image, inode: &mut Inode, logical: usize, alloc: bool) -> Result<Option<u32>> {
    match locate(logical) {
        Location::Direct(i) => {
            if inode.direct[i] == NO_BLOCK {
                if !alloc {
                    return Ok(None);
                }
                inode.direct[i] = Bitmap::alloc_block(image)? as i32;
            }
            Ok(Some(inode.direct[i] as u32))
        }
        Location::Single(i) => {
            if inode.single_indirect == NO_BLOCK {
                if !alloc {
                    return Ok(None);
                }
                let ib = Bitmap::alloc_block(image)?;
                init_index_block(image, ib);
                inode.single_indirect = ib as i32;
            }
            let ib = inode.single_indirect as u32;
            let mut val = image.read_indirect(ib, i);
            if val == NO_BLOCK {
                if !alloc {
                    return Ok(None);
                }
                let b = Bitmap::alloc_block(image)? as i32;
                image.write_indirect(ib, i, b);
                val = b;
            }
            Ok(Some(val as u32))
        }
        Location::Double(l1, l2) => {
            if inode.double_indirect == NO_BLOCK {
                if !alloc {
                    return Ok(None);
                }
                let db = Bitmap::alloc_block(image)?;
                init_index_block(image, db);
                inode.double_indirect = db as i32;
            }
            let db = inode.double_indirect as u32;
            let mut l1_blk = image.read_indirect(db, l1);
            if l1_blk == NO_BLOCK {
                if !alloc {
                    return Ok(None);
                }
                let b = Bitmap::alloc_block(image)?;
                init_index_block(image, b);
                image.write_indirect(db, l1, b as i32);
                l1_blk = b as i32;
            }
            let l1_blk = l1_blk as u32;
            let mut val = image.read_indirect(l1_blk, l2);
            if val == NO_BLOCK {
                if !alloc {
                    return Ok(None);
                }
                let b = Bitmap::alloc_block(image)? as i32;
                image.write_indirect(l1_blk, l2, b);
                val = b;
            }
            Ok(Some(val as u32))
        }
    }
}

/// Physical block for logical block `logical`, or `None` if unmapped.
pub fn read_block(image: &Image, inode: &Inode, logical: usize) -> Option<u32> {
    match locate(logical) {
        Location::Direct(i) => {
            let b = inode.direct[i];
            (b != NO_BLOCK).then_some(b as u32)
        }
        Location::Single(i) => {
            if inode.single_indirect == NO_BLOCK {
                return None;
            }
            let v = image.read_indirect(inode.single_indirect as u32, i);
            (v != NO_BLOCK).then_some(v as u32)
        }
        Location::Double(l1, l2) => {
            if inode.double_indirect == NO_BLOCK {
                return None;
            }
            let l1_blk = image.read_indirect(inode.double_indirect as u32, l1);
            if l1_blk == NO_BLOCK {
                return None;
            }
            let v = image.read_indirect(l1_blk as u32, l2);
            (v != NO_BLOCK).then_some(v as u32)
        }
    }
}

/// Counts how many new blocks (data and index blocks alike) growing the
/// mapped range to cover `[from, to)` would require, without allocating
/// anything.
fn count_new_blocks(image: &Image, inode: &Inode, from: usize, to: usize) -> usize {
    let mut count = 0;
    let mut single_seen = inode.single_indirect != NO_BLOCK;
    let mut double_seen = inode.double_indirect != NO_BLOCK;
    let mut l1_seen: HashSet<usize> = HashSet::new();

    for logical in from..to {
        match locate(logical) {
            Location::Direct(i) => {
                if inode.direct[i] == NO_BLOCK {
                    count += 1;
                }
            }
            Location::Single(i) => {
                if !single_seen {
                    count += 1;
                    single_seen = true;
                }
                let existing = if inode.single_indirect != NO_BLOCK {
                    image.read_indirect(inode.single_indirect as u32, i)
                } else {
                    NO_BLOCK
                };
                if existing == NO_BLOCK {
                    count += 1;
                }
            }
            Location::Double(l1, l2) => {
                if !double_seen {
                    count += 1;
                    double_seen = true;
                }
                let l1_blk = if inode.double_indirect != NO_BLOCK {
                    image.read_indirect(inode.double_indirect as u32, l1)
                } else {
                    NO_BLOCK
                };
                if l1_blk == NO_BLOCK && l1_seen.insert(l1) {
                    count += 1;
                }
                let existing = if l1_blk != NO_BLOCK {
                    image.read_indirect(l1_blk as u32, l2)
                } else {
                    NO_BLOCK
                };
                if existing == NO_BLOCK {
                    count += 1;
                }
            }
        }
    }
    count
}

/// Enumerates every allocated data block of `inode` in logical order:
/// direct, then single-indirect, then double-indirect. Stops at the first
/// unmapped slot at any level, per the on-image sentinel convention — a
/// file never has a hole followed by more data.
pub fn blocks_of(image: &Image, inode: &Inode) -> Vec<u32> {
    let mut out = Vec::new();
    for &d in inode.direct.iter() {
        if d == NO_BLOCK {
            return out;
        }
        out.push(d as u32);
    }
    if inode.single_indirect == NO_BLOCK {
        return out;
    }
    let ib = inode.single_indirect as u32;
    for i in 0..PTRS_PER_BLOCK {
        let v = image.read_indirect(ib, i);
        if v == NO_BLOCK {
            return out;
        }
        out.push(v as u32);
    }
    if inode.double_indirect == NO_BLOCK {
        return out;
    }
    let db = inode.double_indirect as u32;
    for l1 in 0..PTRS_PER_BLOCK {
        let l1_blk = image.read_indirect(db, l1);
        if l1_blk == NO_BLOCK {
            return out;
        }
        for l2 in 0..PTRS_PER_BLOCK {
            let v = image.read_indirect(l1_blk as u32, l2);
            if v == NO_BLOCK {
                return out;
            }
            out.push(v as u32);
        }
    }
    out
}

/// Allocates exactly `n_data_blocks` data blocks (plus the index blocks
/// needed to address them) for a freshly allocated inode whose pointer
/// slots are still all [`NO_BLOCK`]. This is the capacity a regular file
/// is fixed to for its whole lifetime; `write` never grows past it.
pub fn reserve(image: &mut Image, inode: &mut Inode, n_data_blocks: usize) -> Result<()> {
    ensure_range(image, inode, 0, n_data_blocks)
}

/// Ensures logical blocks `[from, to)` are mapped to physical blocks,
/// allocating as needed. Fails atomically: if the image cannot satisfy the
/// whole range the inode and bitmap are left untouched. Used both for
/// `reserve`'s from-scratch allocation and for growing a directory by one
/// block when it outgrows its current capacity.
pub fn ensure_range(image: &mut Image, inode: &mut Inode, from: usize, to: usize) -> Result<()> {
    if to > MAX_BLOCKS_PER_FILE {
        return Err(Error::TooLarge);
    }
    let needed = count_new_blocks(image, inode, from, to);
    if needed as u32 > crate::superblock::Superblock::free_blocks(image) {
        return Err(Error::NoSpace);
    }
    for logical in from..to {
        map_block(image, inode, logical, true)?;
    }
    Ok(())
}

/// Releases every block owned by `inode` (direct, indirect index blocks,
/// double-indirect index blocks and the blocks they point to) and resets
/// all pointers to [`NO_BLOCK`]. Used when a file is unlinked.
pub fn release_all(image: &mut Image, inode: &mut Inode) {
    for slot in inode.direct.iter_mut() {
        if *slot != NO_BLOCK {
            Bitmap::free_block(image, *slot as u32);
            *slot = NO_BLOCK;
        }
    }
    if inode.single_indirect != NO_BLOCK {
        let ib = inode.single_indirect as u32;
        for i in 0..PTRS_PER_BLOCK {
            let b = image.read_indirect(ib, i);
            if b != NO_BLOCK {
                Bitmap::free_block(image, b as u32);
            }
        }
        Bitmap::free_block(image, ib);
        inode.single_indirect = NO_BLOCK;
    }
    if inode.double_indirect != NO_BLOCK {
        let db = inode.double_indirect as u32;
        for l1 in 0..PTRS_PER_BLOCK {
            let l1_blk = image.read_indirect(db, l1);
            if l1_blk == NO_BLOCK {
                continue;
            }
            for l2 in 0..PTRS_PER_BLOCK {
                let b = image.read_indirect(l1_blk as u32, l2);
                if b != NO_BLOCK {
                    Bitmap::free_block(image, b as u32);
                }
            }
            Bitmap::free_block(image, l1_blk as u32);
        }
        Bitmap::free_block(image, db);
        inode.double_indirect = NO_BLOCK;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::Kind;

    fn empty_inode() -> Inode {
        Inode {
            kind: Kind::File,
            size: 0,
            file_count: 0,
            direct: [NO_BLOCK; NUM_DIRECT],
            single_indirect: NO_BLOCK,
            double_indirect: NO_BLOCK,
        }
    }

    #[test]
    fn direct_blocks_allocate_lazily() {
        let mut image = Image::new();
        crate::superblock::Superblock::init(&mut image, crate::layout::INODE_COUNT as u32);
        let mut inode = empty_inode();
        ensure_range(&mut image, &mut inode, 0, 3).unwrap();
        assert!(inode.direct[0] != NO_BLOCK);
        assert!(inode.direct[1] != NO_BLOCK);
        assert!(inode.direct[2] != NO_BLOCK);
        assert_eq!(inode.direct[3], NO_BLOCK);
    }

    #[test]
    fn crossing_into_single_indirect_allocates_index_block() {
        let mut image = Image::new();
        crate::superblock::Superblock::init(&mut image, crate::layout::INODE_COUNT as u32);
        let mut inode = empty_inode();
        ensure_range(&mut image, &mut inode, 0, NUM_DIRECT + 2).unwrap();
        assert!(inode.single_indirect != NO_BLOCK);
        assert!(read_block(&image, &inode, NUM_DIRECT).is_some());
        assert!(read_block(&image, &inode, NUM_DIRECT + 1).is_some());

        let mapped = blocks_of(&image, &inode);
        let distinct: HashSet<_> = mapped.iter().collect();
        assert_eq!(mapped.len(), distinct.len(), "no two logical blocks may alias the same physical block");
    }

    #[test]
    fn single_indirect_unused_slots_read_as_unmapped() {
        // 8·BLOCK_SIZE + 1 bytes worth of blocks: one live entry past the
        // direct pointers, 63 untouched slots in the single-indirect block.
        let mut image = Image::new();
        crate::superblock::Superblock::init(&mut image, crate::layout::INODE_COUNT as u32);
        let mut inode = empty_inode();
        ensure_range(&mut image, &mut inode, 0, NUM_DIRECT + 1).unwrap();

        assert!(read_block(&image, &inode, NUM_DIRECT).is_some());
        for i in (NUM_DIRECT + 1)..(NUM_DIRECT + PTRS_PER_BLOCK) {
            assert_eq!(read_block(&image, &inode, i), None, "unused slot {i} must read back as unmapped, not block 0");
        }
    }

    #[test]
    fn double_indirect_blocks_are_distinct_and_sentinel_filled() {
        let mut image = Image::new();
        crate::superblock::Superblock::init(&mut image, crate::layout::INODE_COUNT as u32);
        let mut inode = empty_inode();
        let target = NUM_DIRECT + PTRS_PER_BLOCK + PTRS_PER_BLOCK + 3;
        ensure_range(&mut image, &mut inode, 0, target).unwrap();

        let mapped = blocks_of(&image, &inode);
        assert_eq!(mapped.len(), target);
        let distinct: HashSet<_> = mapped.iter().collect();
        assert_eq!(mapped.len(), distinct.len(), "no two logical blocks may alias the same physical block");

        // An untouched slot in the second double-indirect L1 block must
        // still read back as unmapped rather than block 0.
        assert_eq!(read_block(&image, &inode, target + 1), None);
    }

    #[test]
    fn release_all_frees_every_owned_block() {
        let mut image = Image::new();
        crate::superblock::Superblock::init(&mut image, crate::layout::INODE_COUNT as u32);
        let mut inode = empty_inode();
        let target = NUM_DIRECT + PTRS_PER_BLOCK + 5;
        ensure_range(&mut image, &mut inode, 0, target).unwrap();
        let free_before = crate::superblock::Superblock::free_blocks(&image);
        release_all(&mut image, &mut inode);
        let free_after = crate::superblock::Superblock::free_blocks(&image);
        assert!(free_after > free_before);
        assert_eq!(inode.direct, [NO_BLOCK; NUM_DIRECT]);
        assert_eq!(inode.single_indirect, NO_BLOCK);
        assert_eq!(inode.double_indirect, NO_BLOCK);
    }

    #[test]
    fn oversized_range_is_rejected_without_mutation() {
        let mut image = Image::new();
        crate::superblock::Superblock::init(&mut image, crate::layout::INODE_COUNT as u32);
        let mut inode = empty_inode();
        assert_eq!(
            ensure_range(&mut image, &mut inode, 0, MAX_BLOCKS_PER_FILE + 1),
            Err(Error::TooLarge)
        );
    }
}
