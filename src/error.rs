//! Error taxonomy for the file system core.
//!
//! Every operation returns a [`Result`] rather than aborting; the host
//! decides what a failure means to its caller. [`Error::Corrupt`] is the one
//! exception worth flagging: it indicates a broken on-image invariant and the
//! host should refuse further operations against the image.

use thiserror::Error;

/// Result alias used throughout this crate.
pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No free data block available.
    #[error("no free data block available")]
    NoSpace,
    /// No free inode slot available.
    #[error("no free inode available")]
    NoInodes,
    /// Requested size exceeds `MAX_FILE_SIZE`.
    #[error("requested size exceeds the maximum file size")]
    TooLarge,
    /// The per-client file-descriptor table has no free slot.
    #[error("file descriptor table is full")]
    FdTableFull,

    /// Path does not resolve to an existing entry.
    #[error("no such file or directory")]
    NotFound,
    /// An entry with this name already exists in the parent directory.
    #[error("entry already exists")]
    Exists,
    /// Expected a directory, found a regular file.
    #[error("not a directory")]
    NotADir,
    /// Expected a regular file, found a directory.
    #[error("is a directory")]
    IsDir,
    /// Attempted to unlink the root directory.
    #[error("cannot unlink the root directory")]
    IsRoot,
    /// Attempted to unlink a non-empty directory.
    #[error("directory is not empty")]
    NotEmpty,

    /// `fd` does not name an open file in this client's table.
    #[error("bad file descriptor")]
    BadFd,

    /// A path segment exceeds `NAME_MAX` bytes.
    #[error("name too long")]
    NameTooLong,
    /// The path is not well-formed (e.g. not absolute).
    #[error("invalid path")]
    PathInvalid,

    /// A broken on-image invariant was detected. Fatal: the image must be
    /// considered corrupt and no further operation should be attempted.
    #[error("file system corrupted: {0}")]
    Corrupt(&'static str),
}
