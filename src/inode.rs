//! Inode table: on-image file/directory metadata records.
//!
//! Each inode is a fixed 64-byte slot addressed directly by inode number
//! (no indirection through a separate free list): `alloc_inode` linear-scans
//! the table for a slot whose `kind` field is [`Kind::Free`], exactly as the
//! reference bitmap allocator scans for a free block.

use crate::error::{Error, Result};
use crate::image::Image;
use crate::layout::{
    INODE_COUNT, INODE_NAME_SIZE, INODE_OFF_DIRECT, INODE_OFF_DOUBLE_INDIRECT,
    INODE_OFF_FILE_COUNT, INODE_OFF_NAME, INODE_OFF_SINGLE_INDIRECT, INODE_OFF_SIZE,
    INODE_OFF_TYPE, INODE_SIZE, INODE_TABLE_OFFSET, INODE_TYPE_SIZE, NO_BLOCK, NUM_DIRECT,
    ROOT_INODE,
};
use crate::superblock::Superblock;
use log::trace;

/// What an inode slot currently holds. The on-image representation is the
/// short ASCII tag spelled out in the ASCII literals below, not an integer
/// — the `type` field is NUL-terminated ASCII per the external layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Free,
    File,
    Dir,
}

impl Kind {
    fn as_tag(self) -> &'static [u8] {
        match self {
            Kind::Free => b"",
            Kind::File => b"reg",
            Kind::Dir => b"dir",
        }
    }

    fn from_tag(tag: &[u8]) -> Self {
        match tag {
            b"reg" => Kind::File,
            b"dir" => Kind::Dir,
            _ => Kind::Free,
        }
    }
}

/// A decoded view of one inode record.
#[derive(Debug, Clone)]
pub struct Inode {
    pub kind: Kind,
    /// File size in bytes, or number of directory entries in use when
    /// `kind == Kind::Dir`.
    pub size: u32,
    /// Number of live directory entries; meaningful only for `Kind::Dir`.
    pub file_count: u16,
    pub direct: [i32; NUM_DIRECT],
    pub single_indirect: i32,
    pub double_indirect: i32,
}

impl Inode {
    fn empty() -> Self {
        Inode {
            kind: Kind::Free,
            size: 0,
            file_count: 0,
            direct: [NO_BLOCK; NUM_DIRECT],
            single_indirect: NO_BLOCK,
            double_indirect: NO_BLOCK,
        }
    }
}

fn slot_offset(ino: u16) -> usize {
    debug_assert!((ino as usize) < INODE_COUNT);
    INODE_TABLE_OFFSET + ino as usize * INODE_SIZE
}

/// Reads and decodes inode `ino`.
pub fn read_inode(image: &Image, ino: u16) -> Inode {
    let base = slot_offset(ino);
    let mut direct = [NO_BLOCK; NUM_DIRECT];
    for (i, slot) in direct.iter_mut().enumerate() {
        *slot = image.read_i32(base + INODE_OFF_DIRECT + i * 4);
    }
    Inode {
        kind: Kind::from_tag(image.read_cstr(base + INODE_OFF_TYPE, INODE_TYPE_SIZE)),
        size: image.read_u32(base + INODE_OFF_SIZE),
        file_count: image.read_u16(base + INODE_OFF_FILE_COUNT),
        direct,
        single_indirect: image.read_i32(base + INODE_OFF_SINGLE_INDIRECT),
        double_indirect: image.read_i32(base + INODE_OFF_DOUBLE_INDIRECT),
    }
}

/// Encodes and writes `inode` into slot `ino`.
pub fn write_inode(image: &mut Image, ino: u16, inode: &Inode) {
    let base = slot_offset(ino);
    image.write_cstr(base + INODE_OFF_TYPE, INODE_TYPE_SIZE, inode.kind.as_tag());
    image.write_u32(base + INODE_OFF_SIZE, inode.size);
    image.write_u16(base + INODE_OFF_FILE_COUNT, inode.file_count);
    for (i, &blk) in inode.direct.iter().enumerate() {
        image.write_i32(base + INODE_OFF_DIRECT + i * 4, blk);
    }
    image.write_i32(base + INODE_OFF_SINGLE_INDIRECT, inode.single_indirect);
    image.write_i32(base + INODE_OFF_DOUBLE_INDIRECT, inode.double_indirect);
}

/// Reads the NUL-terminated name stored in slot `ino`'s name field.
pub fn read_name(image: &Image, ino: u16) -> Vec<u8> {
    image
        .read_cstr(slot_offset(ino) + INODE_OFF_NAME, INODE_NAME_SIZE)
        .to_vec()
}

/// Writes `name` into slot `ino`'s name field. `name` must be at most
/// [`crate::layout::NAME_MAX`] bytes.
pub fn write_name(image: &mut Image, ino: u16, name: &[u8]) {
    image.write_cstr(slot_offset(ino) + INODE_OFF_NAME, INODE_NAME_SIZE, name);
}

/// Formats the image's inode table: every slot free, root inode allocated
/// as an empty directory.
pub fn format(image: &mut Image) {
    for ino in 0..INODE_COUNT as u16 {
        write_inode(image, ino, &Inode::empty());
        write_name(image, ino, b"");
    }
    let root = Inode {
        kind: Kind::Dir,
        size: 0,
        file_count: 0,
        ..Inode::empty()
    };
    write_inode(image, ROOT_INODE, &root);
    write_name(image, ROOT_INODE, b"/");
    Superblock::init(image, INODE_COUNT as u32);
}

/// Scans the inode table for a free slot and marks it as `kind`.
/// Returns [`Error::NoInodes`] if the table is full.
pub fn alloc_inode(image: &mut Image, kind: Kind, name: &[u8]) -> Result<u16> {
    for ino in 0..INODE_COUNT as u16 {
        if read_inode(image, ino).kind == Kind::Free {
            let inode = Inode {
                kind,
                size: 0,
                file_count: 0,
                ..Inode::empty()
            };
            write_inode(image, ino, &inode);
            write_name(image, ino, name);
            Superblock::inc_free_inodes(image, -1);
            trace!("inode: allocated slot {ino} as {kind:?}");
            return Ok(ino);
        }
    }
    Err(Error::NoInodes)
}

/// Marks slot `ino` free. Callers must have already released its data
/// blocks; this only clears the metadata record.
pub fn free_inode(image: &mut Image, ino: u16) {
    write_inode(image, ino, &Inode::empty());
    write_name(image, ino, b"");
    Superblock::inc_free_inodes(image, 1);
    trace!("inode: freed slot {ino}");
}
