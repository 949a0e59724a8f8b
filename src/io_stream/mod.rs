//! Streaming container engine: writer and reader.
//!
//! # Writer
//! [`ArchiveWriter`] wraps a sink in the configured compression transform,
//! writes the version tag, and then accepts entries one at a time.  File
//! content is pulled from a `Read` in fixed-size chunks; no file is ever
//! held in memory whole.
//!
//! # Reader
//! [`ArchiveReader`] sniffs the transform, consumes the version tag, and
//! yields frames in stream order.  After a file frame the caller may copy
//! the content out, skip it, or turn the reader into a bounded
//! [`EntryReader`].  Content left unconsumed is skipped automatically by
//! the next call to [`ArchiveReader::next_entry`].
//!
//! Chunk buffers belong to the writer instance or to the calling function;
//! nothing is shared across calls.

use std::io::{self, Read, Write};

use crate::archive::ArchiveOptions;
use crate::codec::{CodecId, Decoder, Encoder, Peeked};
use crate::error::{ArchiveError, Result};
use crate::frame::{read_frame, write_dir_frame, write_file_header, Entry};
use crate::header::ContainerHeader;
use crate::locate::EntryReader;

/// Default chunk size for streaming file content: 4 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024;

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct ArchiveWriter<W: Write> {
    writer:              Encoder<W>,
    chunk:               Vec<u8>,
    pub header:          ContainerHeader,
    pub entries_written: usize,
    pub content_written: u64,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(writer: W) -> Result<Self> {
        Self::with_options(writer, &ArchiveOptions::default())
    }

    pub fn with_options(writer: W, opts: &ArchiveOptions) -> Result<Self> {
        let mut writer = Encoder::new(writer, opts.codec, opts.level)?;
        let header = ContainerHeader::default();
        header.write(&mut writer)?;
        Ok(Self {
            writer,
            chunk:           vec![0u8; opts.chunk_size.max(1)],
            header,
            entries_written: 0,
            content_written: 0,
        })
    }

    pub fn add_directory(&mut self, path: &str) -> Result<()> {
        write_dir_frame(&mut self.writer, path)?;
        self.entries_written += 1;
        tracing::debug!(path, "archived dir");
        Ok(())
    }

    /// Write a file frame and stream exactly `len` bytes from `content`.
    ///
    /// A source that ends early is a hard error: the frame already promised
    /// `len` bytes and the container would be unreadable past this point.
    pub fn add_file<R: Read>(&mut self, path: &str, len: u64, mut content: R) -> Result<()> {
        let declared = u32::try_from(len).map_err(|_| ArchiveError::FileTooLarge {
            path: path.to_owned(),
            len,
        })?;
        write_file_header(&mut self.writer, path, declared)?;

        let mut remaining = len;
        while remaining > 0 {
            let want = (self.chunk.len() as u64).min(remaining) as usize;
            let n = match content.read(&mut self.chunk[..want]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("{path} shrank while being archived ({remaining} bytes missing)"),
                    )
                    .into())
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.writer.write_all(&self.chunk[..n])?;
            remaining -= n as u64;
        }

        self.entries_written += 1;
        self.content_written += len;
        tracing::debug!(path, len, "archived file");
        Ok(())
    }

    /// Convenience for in-memory content.
    pub fn add_bytes(&mut self, path: &str, data: &[u8]) -> Result<()> {
        self.add_file(path, data.len() as u64, data)
    }

    /// Flush the transform trailer and return the sink.
    pub fn finish(self) -> Result<W> {
        Ok(self.writer.finish()?)
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct ArchiveReader<R: Read> {
    reader:     Decoder<Peeked<R>>,
    pub header: ContainerHeader,
    /// Content bytes of the current file frame not yet consumed.
    pending:    u64,
}

impl<R: Read> ArchiveReader<R> {
    /// Detect the transform and consume the version tag.
    pub fn open(source: R) -> Result<Self> {
        let mut reader = Decoder::detect(source)?;
        let codec = reader.codec();
        let header = ContainerHeader::read(&mut reader)
            .map_err(|e| e.in_stream(codec, "container header"))?;
        Ok(Self { reader, header, pending: 0 })
    }

    pub fn codec(&self) -> CodecId {
        self.reader.codec()
    }

    /// Next frame in stream order, or `None` at the end of the container.
    pub fn next_entry(&mut self) -> Result<Option<Entry>> {
        self.skip_content()?;
        let codec = self.codec();
        let entry = read_frame(&mut self.reader).map_err(|e| e.in_stream(codec, "entry header"))?;
        if let Some(Entry::File { len, .. }) = &entry {
            self.pending = u64::from(*len);
        }
        Ok(entry)
    }

    /// Discard whatever is left of the current file's content.
    pub fn skip_content(&mut self) -> Result<()> {
        if self.pending == 0 {
            return Ok(());
        }
        let want = self.pending;
        let codec = self.codec();
        let skipped = io::copy(&mut self.reader.by_ref().take(want), &mut io::sink())
            .map_err(|e| ArchiveError::from(e).in_stream(codec, "entry content"))?;
        self.pending = 0;
        if skipped < want {
            return Err(ArchiveError::Truncated("entry content"));
        }
        Ok(())
    }

    /// Copy the rest of the current file's content into `dst` through `buf`.
    pub fn copy_content<W: Write>(&mut self, mut dst: W, buf: &mut [u8]) -> Result<u64> {
        let mut copied = 0u64;
        while self.pending > 0 {
            let want = (buf.len() as u64).min(self.pending) as usize;
            let n = match self.reader.read(&mut buf[..want]) {
                Ok(0) => return Err(ArchiveError::Truncated("entry content")),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ArchiveError::from(e).in_stream(self.codec(), "entry content")),
            };
            dst.write_all(&buf[..n])?;
            self.pending -= n as u64;
            copied += n as u64;
        }
        Ok(copied)
    }

    /// Hand the stream over as a view of the current file's remaining content.
    pub fn into_entry_reader(self) -> EntryReader<Decoder<Peeked<R>>> {
        EntryReader::new(self.reader, self.pending)
    }
}
