//! Path resolution: walks an absolute path one directory at a time,
//! resolving either to the final entry or to `(parent, last_segment)` so
//! callers that need to mutate the parent (create, mkdir, unlink) never
//! have to re-walk the path themselves.

use crate::dirent;
use crate::error::{Error, Result};
use crate::image::Image;
use crate::inode::{read_inode, Kind};
use crate::layout::{NAME_MAX, ROOT_INODE};

/// Splits an absolute path into non-empty segments, validating each one.
/// `/`, `//a`, and `/a/` all normalize to the same segment list; a path
/// not starting with `/` is [`Error::PathInvalid`].
fn segments(path: &str) -> Result<Vec<&[u8]>> {
    if !path.starts_with('/') {
        return Err(Error::PathInvalid);
    }
    let mut out = Vec::new();
    for seg in path.split('/') {
        if seg.is_empty() {
            continue;
        }
        if seg.len() > NAME_MAX {
            return Err(Error::NameTooLong);
        }
        out.push(seg.as_bytes());
    }
    Ok(out)
}

/// Resolves `path` to the inode number it names.
pub fn resolve(image: &Image, path: &str) -> Result<u16> {
    let segs = segments(path)?;
    let mut cur = ROOT_INODE;
    for seg in segs {
        let dir = read_inode(image, cur);
        if dir.kind != Kind::Dir {
            return Err(Error::NotADir);
        }
        cur = dirent::lookup(image, &dir, seg)?.ok_or(Error::NotFound)?;
    }
    Ok(cur)
}

/// Resolves `path` to `(parent_inode, last_segment)` without requiring the
/// last segment to already exist — used by `create`, `mkdir` and `unlink`.
/// Fails with [`Error::IsRoot`] when `path` names the root itself, since
/// the root has no parent in this file system.
pub fn resolve_parent<'a>(image: &Image, path: &'a str) -> Result<(u16, &'a [u8])> {
    let segs = segments(path)?;
    let (last, rest) = segs.split_last().ok_or(Error::IsRoot)?;
    let mut cur = ROOT_INODE;
    for seg in rest {
        let dir = read_inode(image, cur);
        if dir.kind != Kind::Dir {
            return Err(Error::NotADir);
        }
        cur = dirent::lookup(image, &dir, seg)?.ok_or(Error::NotFound)?;
    }
    Ok((cur, last))
}
