//! In-memory block-based file system core.
//!
//! A single contiguous byte image holds a superblock, an inode table, a
//! free-block bitmap and the data blocks themselves. On top of that image
//! sit a bitmap allocator, an inode table, block-list machinery that walks
//! direct/single-indirect/double-indirect pointers, a directory layer and
//! a path resolver. [`fs::FileSystem`] wires all of it into the operation
//! surface a host dispatches requests to: create, mkdir, open, close,
//! read, write, lseek, unlink, readdir.
//!
//! The image is the only ground truth; nothing here persists to a real
//! device, journals, or survives process exit. Concurrent access from
//! multiple host threads must be serialized by the caller — see the
//! crate's design notes for the locking discipline this assumes.

pub mod bitmap;
pub mod blocks;
pub mod dirent;
pub mod error;
pub mod fd;
pub mod fs;
pub mod image;
pub mod inode;
pub mod layout;
pub mod path;
pub mod superblock;

pub use error::{Error, Result};
pub use fs::FileSystem;
