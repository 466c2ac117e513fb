//! Directory layer: entries are fixed 16-byte records (14-byte name + a
//! 2-byte inode number) packed into a directory inode's data blocks like
//! any other file content.
//!
//! A directory entry with inode number 0 is a free slot: inode 0 is always
//! the root, which never appears as a child of another directory, so the
//! value doubles safely as a tombstone. [`remove`] zeroes a slot in place
//! rather than compacting the block; [`insert`] reuses the first such hole
//! before growing the directory.

use crate::blocks::{ensure_range, read_block};
use crate::error::{Error, Result};
use crate::image::Image;
use crate::inode::Inode;
use crate::layout::{DIRENTS_PER_BLOCK, DIRENT_NAME_SIZE, DIRENT_SIZE, NAME_MAX};

const FREE_SLOT: u16 = 0;

fn slot_position(slot: usize) -> (usize, usize) {
    (slot / DIRENTS_PER_BLOCK, slot % DIRENTS_PER_BLOCK)
}

fn read_slot(image: &Image, inode: &Inode, slot: usize) -> Option<(u16, Vec<u8>)> {
    let (blk_idx, idx_in_blk) = slot_position(slot);
    let blk = read_block(image, inode, blk_idx)?;
    let data = image.block(blk);
    let off = idx_in_blk * DIRENT_SIZE;
    let name_field = &data[off..off + DIRENT_NAME_SIZE];
    let end = name_field.iter().position(|&b| b == 0).unwrap_or(name_field.len());
    let ino = u16::from_le_bytes([data[off + DIRENT_NAME_SIZE], data[off + DIRENT_NAME_SIZE + 1]]);
    Some((ino, name_field[..end].to_vec()))
}

fn write_slot(image: &mut Image, inode: &Inode, slot: usize, ino: u16, name: &[u8]) {
    let (blk_idx, idx_in_blk) = slot_position(slot);
    let blk = read_block(image, inode, blk_idx).expect("slot's block must already be mapped");
    let data = image.block_mut(blk);
    let off = idx_in_blk * DIRENT_SIZE;
    data[off..off + DIRENT_NAME_SIZE].fill(0);
    data[off..off + name.len()].copy_from_slice(name);
    data[off + DIRENT_NAME_SIZE..off + DIRENT_SIZE].copy_from_slice(&ino.to_le_bytes());
}

fn slot_count(inode: &Inode) -> usize {
    inode.size as usize / DIRENT_SIZE
}

/// Looks up `name` among `dir`'s entries. Returns the child's inode number.
///
/// Walks every slot regardless of whether `name` was already found, so the
/// live-entry count can be checked against `dir.file_count`: a mismatch
/// means the on-image directory is corrupt and is reported as such rather
/// than silently returning a possibly-wrong answer.
pub fn lookup(image: &Image, dir: &Inode, name: &[u8]) -> Result<Option<u16>> {
    let mut live = 0u16;
    let mut found = None;
    for slot in 0..slot_count(dir) {
        if let Some((ino, entry_name)) = read_slot(image, dir, slot) {
            if ino != FREE_SLOT {
                live += 1;
                if found.is_none() && entry_name == name {
                    found = Some(ino);
                }
            }
        }
    }
    if live != dir.file_count {
        return Err(Error::Corrupt("file_count mismatch"));
    }
    Ok(found)
}

/// Lists all live entries of `dir` in slot order.
pub fn list(image: &Image, dir: &Inode) -> Result<Vec<(Vec<u8>, u16)>> {
    let mut out = Vec::new();
    for slot in 0..slot_count(dir) {
        if let Some((ino, name)) = read_slot(image, dir, slot) {
            if ino != FREE_SLOT {
                out.push((name, ino));
            }
        }
    }
    if out.len() as u16 != dir.file_count {
        return Err(Error::Corrupt("file_count mismatch"));
    }
    Ok(out)
}

/// Inserts `(name, ino)` into `dir`, reusing a tombstoned slot if one
/// exists, otherwise growing the directory by one block worth of capacity
/// as needed. Fails with [`Error::NameTooLong`] if `name` exceeds
/// [`NAME_MAX`], or propagates [`Error::NoSpace`] from the block allocator.
pub fn insert(image: &mut Image, dir: &mut Inode, ino: u16, name: &[u8]) -> Result<()> {
    if name.len() > NAME_MAX {
        return Err(Error::NameTooLong);
    }
    let total = slot_count(dir);
    for slot in 0..total {
        if let Some((existing, _)) = read_slot(image, dir, slot) {
            if existing == FREE_SLOT {
                write_slot(image, dir, slot, ino, name);
                dir.file_count += 1;
                return Ok(());
            }
        }
    }
    let new_slot = total;
    let (blk_idx, _) = slot_position(new_slot);
    ensure_range(image, dir, blk_idx, blk_idx + 1)?;
    dir.size = ((new_slot + 1) * DIRENT_SIZE) as u32;
    write_slot(image, dir, new_slot, ino, name);
    dir.file_count += 1;
    Ok(())
}

/// Removes the entry named `name` from `dir`, returning its inode number.
/// Returns [`Error::NotFound`] if no such entry exists, or
/// [`Error::Corrupt`] if the live-entry count disagrees with
/// `dir.file_count`.
pub fn remove(image: &mut Image, dir: &mut Inode, name: &[u8]) -> Result<u16> {
    let mut live = 0u16;
    let mut target_slot = None;
    let mut target_ino = 0u16;
    for slot in 0..slot_count(dir) {
        if let Some((ino, entry_name)) = read_slot(image, dir, slot) {
            if ino != FREE_SLOT {
                live += 1;
                if target_slot.is_none() && entry_name == name {
                    target_slot = Some(slot);
                    target_ino = ino;
                }
            }
        }
    }
    if live != dir.file_count {
        return Err(Error::Corrupt("file_count mismatch"));
    }
    let slot = target_slot.ok_or(Error::NotFound)?;
    write_slot(image, dir, slot, FREE_SLOT, b"");
    dir.file_count -= 1;
    Ok(target_ino)
}

/// True if `dir` has no live entries.
pub fn is_empty(dir: &Inode) -> bool {
    dir.file_count == 0
}
