//! Single-entry lookup without extraction.
//!
//! There is no index: [`locate`] walks the frames in order, skipping the
//! payload of every file it is not looking for, and stops at the first frame
//! whose path equals the target.  Cost is linear in the bytes preceding the
//! entry; memory stays bounded by the copy buffer regardless of file sizes.
//!
//! On a match the whole stream moves into the returned [`EntryReader`], which
//! exposes exactly the entry's content and then reports end of stream.  The
//! caller owns it from then on; dropping it closes the underlying source.

use std::io::{self, Read};

use crate::codec::{Decoder, Peeked};
use crate::error::Result;
use crate::frame::Entry;
use crate::io_stream::ArchiveReader;

/// Read-only view over the next `len` bytes of an underlying stream.
#[derive(Debug)]
pub struct EntryReader<R> {
    inner:     R,
    len:       u64,
    remaining: u64,
}

impl<R: Read> EntryReader<R> {
    pub fn new(inner: R, len: u64) -> Self {
        Self { inner, len, remaining: len }
    }

    /// Total content length of the entry.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Give back the underlying stream, positioned wherever reading stopped.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for EntryReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = (buf.len() as u64).min(self.remaining) as usize;
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("archive ended with {} entry bytes outstanding", self.remaining),
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Bounded view handed out by [`locate`] for a source of type `R`.
pub type EntryStream<R> = EntryReader<Decoder<Peeked<R>>>;

/// Outcome of [`locate`].
pub enum Located<R: Read> {
    Found {
        entry:  Entry,
        reader: EntryStream<R>,
    },
    NotFound,
}

impl<R: Read> Located<R> {
    pub fn is_found(&self) -> bool {
        matches!(self, Located::Found { .. })
    }
}

/// Scan `source` for the entry whose path equals `target`.
pub fn locate<R: Read>(source: R, target: &str) -> Result<Located<R>> {
    let mut archive = ArchiveReader::open(source)?;
    let mut scanned = 0usize;
    while let Some(entry) = archive.next_entry()? {
        scanned += 1;
        if entry.path() == target {
            tracing::debug!(path = target, scanned, len = entry.content_len(), "entry located");
            return Ok(Located::Found { entry, reader: archive.into_entry_reader() });
        }
    }
    tracing::debug!(path = target, scanned, "entry not found");
    Ok(Located::NotFound)
}

/// Callback form of [`locate`].
pub trait LocateListener {
    fn on_located(&mut self, path: &str, len: u32, is_dir: bool);
    /// Called for files only, after [`on_located`](Self::on_located).
    fn on_stream_ready(&mut self, reader: &mut dyn Read, len: u32) -> io::Result<()>;
    fn on_not_found(&mut self);
}

/// Run [`locate`] and report the outcome to `listener`.  Returns whether the
/// entry was found.
pub fn locate_with<R, L>(source: R, target: &str, listener: &mut L) -> Result<bool>
where
    R: Read,
    L: LocateListener + ?Sized,
{
    match locate(source, target)? {
        Located::Found { entry, mut reader } => {
            listener.on_located(entry.path(), entry.content_len(), entry.is_dir());
            if let Entry::File { len, .. } = entry {
                listener.on_stream_ready(&mut reader, len)?;
            }
            Ok(true)
        }
        Located::NotFound => {
            listener.on_not_found();
            Ok(false)
        }
    }
}
