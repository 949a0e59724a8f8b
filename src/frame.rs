//! Entry frames.
//!
//! ```text
//! DirEntry  := u16 header(bit15=1, bits0-14=path_len) | path bytes
//! FileEntry := u16 header(bit15=0, bits0-14=path_len) | path bytes | u32 content_len | content
//! ```
//!
//! Paths are UTF-8 with `/` separators, relative to the archive root.  The
//! content bytes of a file are not part of the frame codec: the caller
//! streams them after [`write_file_header`] and consumes them after
//! [`read_frame`].

use serde::Serialize;
use std::io::{Read, Write};

use crate::error::{ArchiveError, Result};
use crate::wire::{read_u16_le, read_u32_le, write_u16_le, write_u32_le};

/// High bit of the frame header: set for directories.
pub const DIR_MARK_BIT: u16 = 0x8000;
/// Longest path the 15-bit length field can describe.
pub const MAX_PATH_LEN: usize = 0x7FFF;

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entry {
    Directory { path: String },
    File { path: String, len: u32 },
}

impl Entry {
    pub fn path(&self) -> &str {
        match self {
            Entry::Directory { path } | Entry::File { path, .. } => path,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Entry::Directory { .. })
    }

    /// Content length; zero for directories.
    pub fn content_len(&self) -> u32 {
        match self {
            Entry::Directory { .. } => 0,
            Entry::File { len, .. } => *len,
        }
    }
}

fn frame_header(path: &str, is_dir: bool) -> Result<u16> {
    let len = path.len();
    if len > MAX_PATH_LEN {
        return Err(ArchiveError::PathTooLong { len });
    }
    let mark = if is_dir { DIR_MARK_BIT } else { 0 };
    Ok(mark | len as u16)
}

fn write_path<W: Write>(mut writer: W, path: &str, is_dir: bool) -> Result<()> {
    let header = frame_header(path, is_dir)?;
    write_u16_le(&mut writer, header)?;
    writer.write_all(path.as_bytes())?;
    Ok(())
}

pub fn write_dir_frame<W: Write>(writer: W, path: &str) -> Result<()> {
    write_path(writer, path, true)
}

/// Write a file frame up to and including the content length.  Exactly
/// `len` content bytes must follow.
pub fn write_file_header<W: Write>(mut writer: W, path: &str, len: u32) -> Result<()> {
    write_path(&mut writer, path, false)?;
    write_u32_le(&mut writer, len)?;
    Ok(())
}

/// Decode the next frame.  `Ok(None)` is the normal end of the container.
pub fn read_frame<R: Read>(mut reader: R) -> Result<Option<Entry>> {
    let header = match read_u16_le(&mut reader)? {
        Some(h) => h,
        None    => return Ok(None),
    };
    let is_dir = header & DIR_MARK_BIT != 0;
    let path_len = (header & !DIR_MARK_BIT) as usize;

    let mut raw = vec![0u8; path_len];
    reader
        .read_exact(&mut raw)
        .map_err(ArchiveError::eof_as_truncated("entry path"))?;
    let path = String::from_utf8(raw).map_err(|_| ArchiveError::InvalidPathEncoding)?;

    if is_dir {
        return Ok(Some(Entry::Directory { path }));
    }
    let len = read_u32_le(&mut reader).map_err(ArchiveError::eof_as_truncated("content length"))?;
    Ok(Some(Entry::File { path, len }))
}
