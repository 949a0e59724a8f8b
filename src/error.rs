//! Crate-wide error type and the coarse classes callers branch on.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::codec::CodecId;

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Broad failure classes.  All of them abort the operation that produced
/// them.  Files vanishing mid-archive are skipped by the writer and never
/// surface here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Configuration,
    FormatViolation,
    StreamCorruption,
    Io,
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    // ── Configuration ────────────────────────────────────────────────────────
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("Root path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Invalid output path {path}: {reason}")]
    InvalidOutput { path: PathBuf, reason: &'static str },
    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),
    #[error("Archive file not found: {0}")]
    ArchiveNotFound(PathBuf),
    #[error("Not a file: {0}")]
    NotAFile(PathBuf),

    // ── Format violations (encode time) ──────────────────────────────────────
    #[error("File path too long: {len} bytes (max {max})", max = crate::frame::MAX_PATH_LEN)]
    PathTooLong { len: usize },
    #[error("File too large for a 32-bit length field: {path} ({len} bytes)")]
    FileTooLarge { path: String, len: u64 },

    // ── Stream corruption (decode time) ──────────────────────────────────────
    #[error("Truncated archive: unexpected end of stream while reading {0}")]
    Truncated(&'static str),
    #[error("Entry path is not valid UTF-8")]
    InvalidPathEncoding,
    #[error("Corrupt {codec} stream while reading {what}: {source}")]
    CorruptStream { codec: &'static str, what: &'static str, source: io::Error },
    #[error("Entry path escapes the output directory: {0:?}")]
    UnsafePath(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ArchiveError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ArchiveError::DirectoryNotFound(_)
            | ArchiveError::NotADirectory(_)
            | ArchiveError::InvalidOutput { .. }
            | ArchiveError::NonUtf8Path(_)
            | ArchiveError::ArchiveNotFound(_)
            | ArchiveError::NotAFile(_) => ErrorClass::Configuration,
            ArchiveError::PathTooLong { .. }
            | ArchiveError::FileTooLarge { .. } => ErrorClass::FormatViolation,
            ArchiveError::Truncated(_)
            | ArchiveError::InvalidPathEncoding
            | ArchiveError::CorruptStream { .. }
            | ArchiveError::UnsafePath(_) => ErrorClass::StreamCorruption,
            ArchiveError::Io(_) => ErrorClass::Io,
        }
    }

    /// Map an `UnexpectedEof` from a mid-frame read onto [`ArchiveError::Truncated`].
    pub(crate) fn eof_as_truncated(what: &'static str) -> impl FnOnce(io::Error) -> ArchiveError {
        move |e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                ArchiveError::Truncated(what)
            } else {
                ArchiveError::Io(e)
            }
        }
    }

    /// Reclassify a failed read of container bytes.  An early end is
    /// truncation whatever the codec; a decoder rejecting its input means the
    /// compressed stream is damaged.  Other errors stay I/O failures of the
    /// source.
    pub(crate) fn in_stream(self, codec: CodecId, what: &'static str) -> ArchiveError {
        match self {
            ArchiveError::Io(e) => match e.kind() {
                io::ErrorKind::UnexpectedEof => ArchiveError::Truncated(what),
                io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::Other
                    if codec != CodecId::None =>
                {
                    ArchiveError::CorruptStream { codec: codec.name(), what, source: e }
                }
                _ => ArchiveError::Io(e),
            },
            other => other,
        }
    }
}

impl From<walkdir::Error> for ArchiveError {
    fn from(e: walkdir::Error) -> Self {
        let msg = e.to_string();
        let io = e
            .into_io_error()
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, msg));
        ArchiveError::Io(io)
    }
}
