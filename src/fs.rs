//! Operation layer: the file system's public surface, wiring the image,
//! the inode/bitmap/directory/path layers, and a client's fd table into
//! the nine operations a host dispatches to.
//!
//! Regular files are sized once at `create` time and never grow: `write`
//! only fills in blocks already reserved for the file and fails with
//! [`Error::TooLarge`] past that capacity. Directories are the one
//! exception — they grow a block at a time as entries are added, which is
//! why `dirent::insert` is allowed to allocate where `write` is not.

use log::{debug, warn};

use crate::blocks;
use crate::dirent;
use crate::error::{Error, Result};
use crate::fd::FdTable;
use crate::image::Image;
use crate::inode::{self, read_inode, write_inode, Kind};
use crate::layout::{BLOCK_SIZE, MAX_FILE_SIZE, ROOT_INODE};
use crate::path;
use crate::superblock::Superblock;

pub struct FileSystem {
    image: Image,
}

impl FileSystem {
    /// Builds a fresh, formatted image: every inode free except the root.
    pub fn new() -> Self {
        let mut image = Image::new();
        inode::format(&mut image);
        debug!("file system formatted, fresh image");
        FileSystem { image }
    }

    /// A new client's empty file-descriptor table. The image is shared;
    /// the table is not.
    pub fn new_client(&self) -> FdTable {
        FdTable::new()
    }

    pub fn free_blocks(&self) -> u32 {
        Superblock::free_blocks(&self.image)
    }

    pub fn free_inodes(&self) -> u32 {
        Superblock::free_inodes(&self.image)
    }

    /// Creates a regular file at `path` with `size` bytes immediately
    /// reserved. Capacity is fixed for the file's lifetime; `write` cannot
    /// grow it further.
    pub fn create(&mut self, path: &str, size: usize) -> Result<u16> {
        if size > MAX_FILE_SIZE {
            return Err(Error::TooLarge);
        }
        let (parent_ino, name) = path::resolve_parent(&self.image, path)?;
        let mut parent = read_inode(&self.image, parent_ino);
        if parent.kind != Kind::Dir {
            return Err(Error::NotADir);
        }
        if dirent::lookup(&self.image, &parent, name)?.is_some() {
            return Err(Error::Exists);
        }

        let ino = inode::alloc_inode(&mut self.image, Kind::File, name)?;
        let mut file = read_inode(&self.image, ino);
        let n_blocks = size.div_ceil(BLOCK_SIZE);
        if let Err(e) = blocks::reserve(&mut self.image, &mut file, n_blocks) {
            inode::free_inode(&mut self.image, ino);
            return Err(e);
        }
        file.size = size as u32;
        write_inode(&mut self.image, ino, &file);

        if let Err(e) = dirent::insert(&mut self.image, &mut parent, ino, name) {
            let mut file = read_inode(&self.image, ino);
            blocks::release_all(&mut self.image, &mut file);
            inode::free_inode(&mut self.image, ino);
            return Err(e);
        }
        write_inode(&mut self.image, parent_ino, &parent);
        debug!("created file {path:?} as inode {ino} ({size} bytes, {n_blocks} blocks)");
        Ok(ino)
    }

    /// Creates an empty directory at `path`, pre-reserving one block for
    /// its first entries.
    pub fn mkdir(&mut self, path: &str) -> Result<u16> {
        let (parent_ino, name) = path::resolve_parent(&self.image, path)?;
        let mut parent = read_inode(&self.image, parent_ino);
        if parent.kind != Kind::Dir {
            return Err(Error::NotADir);
        }
        if dirent::lookup(&self.image, &parent, name)?.is_some() {
            return Err(Error::Exists);
        }

        let ino = inode::alloc_inode(&mut self.image, Kind::Dir, name)?;
        let mut dir = read_inode(&self.image, ino);
        if let Err(e) = blocks::reserve(&mut self.image, &mut dir, 1) {
            inode::free_inode(&mut self.image, ino);
            return Err(e);
        }
        write_inode(&mut self.image, ino, &dir);

        if let Err(e) = dirent::insert(&mut self.image, &mut parent, ino, name) {
            let mut dir = read_inode(&self.image, ino);
            blocks::release_all(&mut self.image, &mut dir);
            inode::free_inode(&mut self.image, ino);
            return Err(e);
        }
        write_inode(&mut self.image, parent_ino, &parent);
        debug!("created directory {path:?} as inode {ino}");
        Ok(ino)
    }

    /// Resolves `path` and returns its fd, reusing an existing descriptor
    /// if the client already has this inode open.
    pub fn open(&self, fds: &mut FdTable, path: &str) -> Result<usize> {
        let ino = path::resolve(&self.image, path)?;
        fds.open(ino)
    }

    pub fn close(&self, fds: &mut FdTable, fd: usize) -> Result<()> {
        fds.close(fd)
    }

    /// Reads up to `buf.len()` bytes from `fd` starting at its current
    /// offset, stopping at end-of-file, and advances the offset by the
    /// number of bytes actually read.
    pub fn read(&self, fds: &mut FdTable, fd: usize, buf: &mut [u8]) -> Result<usize> {
        let open = *fds.get(fd)?;
        let file = read_inode(&self.image, open.inode);
        if file.kind != Kind::File {
            return Err(Error::IsDir);
        }
        let size = file.size as usize;
        let start = (open.offset as usize).min(size);
        let n = buf.len().min(size - start);
        self.copy_out(&file, start, &mut buf[..n]);
        fds.get_mut(fd)?.offset = (start + n) as u32;
        Ok(n)
    }

    /// Writes `buf` to `fd` at its current offset. Never grows the file's
    /// reserved capacity; writing past it fails with [`Error::TooLarge`]
    /// and leaves the file unchanged.
    pub fn write(&mut self, fds: &mut FdTable, fd: usize, buf: &[u8]) -> Result<usize> {
        let open = *fds.get(fd)?;
        let mut file = read_inode(&self.image, open.inode);
        if file.kind != Kind::File {
            return Err(Error::IsDir);
        }
        let capacity = blocks::blocks_of(&self.image, &file).len() * BLOCK_SIZE;
        let start = open.offset as usize;
        let end = start
            .checked_add(buf.len())
            .filter(|&e| e <= capacity)
            .ok_or(Error::TooLarge)?;

        self.copy_in(&file, start, buf);
        if end > file.size as usize {
            file.size = end as u32;
            write_inode(&mut self.image, open.inode, &file);
        }
        fds.get_mut(fd)?.offset = end as u32;
        Ok(buf.len())
    }

    /// Moves `fd`'s offset to `offset`, clamped to `[0, size]`.
    pub fn lseek(&self, fds: &mut FdTable, fd: usize, offset: i64) -> Result<u32> {
        let open = *fds.get(fd)?;
        let file = read_inode(&self.image, open.inode);
        let clamped = offset.clamp(0, file.size as i64) as u32;
        fds.get_mut(fd)?.offset = clamped;
        Ok(clamped)
    }

    /// Removes the entry named by `path`. Directories must be empty.
    /// The root can never be unlinked.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let (parent_ino, name) = path::resolve_parent(&self.image, path)?;
        let mut parent = read_inode(&self.image, parent_ino);
        let ino = dirent::lookup(&self.image, &parent, name)?.ok_or(Error::NotFound)?;
        if ino == ROOT_INODE {
            return Err(Error::IsRoot);
        }
        let mut target = read_inode(&self.image, ino);
        if target.kind == Kind::Dir && !dirent::is_empty(&target) {
            return Err(Error::NotEmpty);
        }
        dirent::remove(&mut self.image, &mut parent, name)?;
        write_inode(&mut self.image, parent_ino, &parent);
        blocks::release_all(&mut self.image, &mut target);
        inode::free_inode(&mut self.image, ino);
        debug!("unlinked {path:?} (was inode {ino})");
        Ok(())
    }

    /// Returns the next `(name, inode)` entry of the directory open on
    /// `fd`, or `None` at end-of-directory. Advances the directory cursor.
    pub fn readdir(&self, fds: &mut FdTable, fd: usize) -> Result<Option<(Vec<u8>, u16)>> {
        let open = *fds.get(fd)?;
        let dir = read_inode(&self.image, open.inode);
        if dir.kind != Kind::Dir {
            return Err(Error::NotADir);
        }
        let entries = dirent::list(&self.image, &dir)?;
        let cursor = open.dir_cursor as usize;
        if cursor >= entries.len() {
            return Ok(None);
        }
        fds.get_mut(fd)?.dir_cursor += 1;
        Ok(Some(entries[cursor].clone()))
    }

    fn copy_out(&self, file: &crate::inode::Inode, start: usize, dst: &mut [u8]) {
        let mut done = 0;
        while done < dst.len() {
            let pos = start + done;
            let logical = pos / BLOCK_SIZE;
            let in_block = pos % BLOCK_SIZE;
            let take = (BLOCK_SIZE - in_block).min(dst.len() - done);
            match blocks::read_block(&self.image, file, logical) {
                Some(blk) => {
                    let block = self.image.block(blk);
                    dst[done..done + take].copy_from_slice(&block[in_block..in_block + take]);
                }
                None => {
                    warn!("read encountered an unmapped block within file bounds");
                    dst[done..done + take].fill(0);
                }
            }
            done += take;
        }
    }

    fn copy_in(&mut self, file: &crate::inode::Inode, start: usize, src: &[u8]) {
        let mut done = 0;
        while done < src.len() {
            let pos = start + done;
            let logical = pos / BLOCK_SIZE;
            let in_block = pos % BLOCK_SIZE;
            let take = (BLOCK_SIZE - in_block).min(src.len() - done);
            let blk = blocks::read_block(&self.image, file, logical)
                .expect("write range was validated against reserved capacity");
            let block = self.image.block_mut(blk);
            block[in_block..in_block + take].copy_from_slice(&src[done..done + take]);
            done += take;
        }
    }
}

impl Default for FileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_image_create_one_file() {
        let mut fs = FileSystem::new();
        let ino = fs.create("/a.txt", 300).unwrap();
        assert_eq!(ino, 1);
        let file = read_inode(&fs.image, ino);
        assert_eq!(file.kind, Kind::File);
        assert_eq!(file.size, 300);
        assert!(file.direct[0] != crate::layout::NO_BLOCK);
        assert!(file.direct[1] != crate::layout::NO_BLOCK);
        assert_eq!(file.direct[2], crate::layout::NO_BLOCK);

        let root = read_inode(&fs.image, ROOT_INODE);
        assert_eq!(root.file_count, 1);
        assert_eq!(dirent::lookup(&fs.image, &root, b"a.txt").unwrap(), Some(1));
    }

    #[test]
    fn lookup_path_of_depth_two() {
        let mut fs = FileSystem::new();
        let d = fs.mkdir("/d").unwrap();
        assert_eq!(d, 1);
        let x = fs.create("/d/x", 0).unwrap();
        assert_eq!(x, 2);
        assert_eq!(path::resolve(&fs.image, "/d/x").unwrap(), x);
        assert_eq!(path::resolve(&fs.image, "/d/y"), Err(Error::NotFound));
    }

    #[test]
    fn unlink_releases_blocks() {
        let mut fs = FileSystem::new();
        let before = fs.free_blocks();
        fs.create("/big", 100 * 1024).unwrap();
        assert!(fs.free_blocks() < before);
        fs.unlink("/big").unwrap();
        assert_eq!(fs.free_blocks(), before);
    }

    #[test]
    fn write_read_round_trip() {
        let mut fs = FileSystem::new();
        fs.create("/f", 1024).unwrap();
        let mut fds = fs.new_client();
        let fd = fs.open(&mut fds, "/f").unwrap();
        let data: Vec<u8> = (0..1024u32).map(|i| (i % 256) as u8).collect();
        assert_eq!(fs.write(&mut fds, fd, &data).unwrap(), 1024);
        fs.lseek(&mut fds, fd, 0).unwrap();
        let mut out = vec![0u8; 1024];
        assert_eq!(fs.read(&mut fds, fd, &mut out).unwrap(), 1024);
        assert_eq!(out, data);
    }

    #[test]
    fn random_chunked_writes_read_back_intact() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let mut fs = FileSystem::new();
        let size = 5000; // crosses into the single-indirect range (> 8 blocks)
        fs.create("/r", size).unwrap();
        let ino = path::resolve(&fs.image, "/r").unwrap();
        let reserved = read_inode(&fs.image, ino);
        let mapped = blocks::blocks_of(&fs.image, &reserved);
        let distinct: std::collections::HashSet<_> = mapped.iter().collect();
        assert_eq!(mapped.len(), distinct.len(), "no two logical blocks may alias the same physical block");

        let mut fds = fs.new_client();
        let fd = fs.open(&mut fds, "/r").unwrap();
        let expected: Vec<u8> = (0..size).map(|_| rng.gen()).collect();

        let mut offset = 0usize;
        while offset < size {
            let chunk = rng.gen_range(1..=64).min(size - offset);
            fs.write(&mut fds, fd, &expected[offset..offset + chunk]).unwrap();
            offset += chunk;
        }

        fs.lseek(&mut fds, fd, 0).unwrap();
        let mut actual = vec![0u8; size];
        let mut done = 0;
        while done < size {
            let chunk = rng.gen_range(1..=64).min(size - done);
            let n = fs.read(&mut fds, fd, &mut actual[done..done + chunk]).unwrap();
            assert!(n > 0);
            done += n;
        }
        assert_eq!(actual, expected);
    }

    #[test]
    fn name_collision_leaves_image_unchanged() {
        let mut fs = FileSystem::new();
        fs.create("/a", 0).unwrap();
        let free_before = fs.free_blocks();
        let inodes_before = fs.free_inodes();
        assert_eq!(fs.create("/a", 0), Err(Error::Exists));
        assert_eq!(fs.free_blocks(), free_before);
        assert_eq!(fs.free_inodes(), inodes_before);
    }

    #[test]
    fn inode_exhaustion_stops_at_inode_count_minus_one() {
        let mut fs = FileSystem::new();
        let mut created = 0;
        loop {
            match fs.create(&format!("/f{created}"), 0) {
                Ok(_) => created += 1,
                Err(Error::NoInodes) => break,
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }
        assert_eq!(created, crate::layout::INODE_COUNT - 1);
    }

    #[test]
    fn write_past_reserved_capacity_is_too_large() {
        // size 10 reserves a single 256-byte block; lseek can only reach
        // the current size (10), so the overflow has to come from the
        // buffer length rather than the offset.
        let mut fs = FileSystem::new();
        fs.create("/f", 10).unwrap();
        let mut fds = fs.new_client();
        let fd = fs.open(&mut fds, "/f").unwrap();
        fs.lseek(&mut fds, fd, 10).unwrap();
        let overflow = vec![0u8; BLOCK_SIZE];
        assert_eq!(fs.write(&mut fds, fd, &overflow), Err(Error::TooLarge));
    }

    #[test]
    fn unlink_nonempty_directory_fails() {
        let mut fs = FileSystem::new();
        fs.mkdir("/d").unwrap();
        fs.create("/d/x", 0).unwrap();
        assert_eq!(fs.unlink("/d"), Err(Error::NotEmpty));
    }

    #[test]
    fn unlink_root_fails() {
        let mut fs = FileSystem::new();
        assert_eq!(fs.unlink("/"), Err(Error::IsRoot));
    }

    #[test]
    fn readdir_lists_entries_then_ends() {
        let mut fs = FileSystem::new();
        fs.create("/a", 0).unwrap();
        fs.create("/b", 0).unwrap();
        let mut fds = fs.new_client();
        let fd = fs.open(&mut fds, "/").unwrap();
        let mut names = Vec::new();
        while let Some((name, _)) = fs.readdir(&mut fds, fd).unwrap() {
            names.push(name);
        }
        assert_eq!(names, vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(fs.readdir(&mut fds, fd).unwrap(), None);
    }
}
