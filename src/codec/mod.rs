//! Whole-stream compression transforms.
//!
//! A container is either raw or wrapped, end to end, in one of the codecs
//! below.  Nothing inside the container records which: readers identify the
//! transform from the standard magic prefix of the codec's own framing.  A
//! raw container starts with its little-endian version tag (`01 00` for
//! containers written by this crate), which collides with none of them.
//!
//! Detection peeks at most [`MAX_MAGIC_LEN`] bytes and replays them in front
//! of the remaining stream, so it works on pipes and sockets as well as on
//! seekable files.

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Cursor, Read, Write};

pub const MAGIC_GZIP: [u8; 2] = [0x1f, 0x8b];
pub const MAGIC_ZSTD: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];
pub const MAGIC_LZ4:  [u8; 4] = [0x04, 0x22, 0x4d, 0x18];

/// Longest magic prefix among the supported codecs.
pub const MAX_MAGIC_LEN: usize = 4;

/// Default gzip level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecId {
    None,
    Gzip,
    Zstd,
    Lz4,
}

impl CodecId {
    /// Magic prefix written by the codec, empty for `None`.
    pub fn magic(self) -> &'static [u8] {
        match self {
            CodecId::None => &[],
            CodecId::Gzip => &MAGIC_GZIP,
            CodecId::Zstd => &MAGIC_ZSTD,
            CodecId::Lz4  => &MAGIC_LZ4,
        }
    }

    /// Human-readable name, for diagnostics only.
    pub fn name(self) -> &'static str {
        match self {
            CodecId::None => "none",
            CodecId::Gzip => "gzip",
            CodecId::Zstd => "zstd",
            CodecId::Lz4  => "lz4",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "raw"  => Some(CodecId::None),
            "gzip" | "gz"   => Some(CodecId::Gzip),
            "zstd" | "zst"  => Some(CodecId::Zstd),
            "lz4"           => Some(CodecId::Lz4),
            _               => None,
        }
    }

    /// Identify the transform from the first bytes of a stream.
    pub fn detect(prefix: &[u8]) -> Self {
        [CodecId::Gzip, CodecId::Zstd, CodecId::Lz4]
            .into_iter()
            .find(|c| prefix.starts_with(c.magic()))
            .unwrap_or(CodecId::None)
    }
}

// ── Encoding ─────────────────────────────────────────────────────────────────

/// Write side of a transform.  Must be [`finish`](Encoder::finish)ed so the
/// codec can flush its trailer.
pub enum Encoder<W: Write> {
    None(W),
    Gzip(GzEncoder<W>),
    Zstd(zstd::stream::write::Encoder<'static, W>),
    Lz4(lz4_flex::frame::FrameEncoder<W>),
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W, codec: CodecId, level: i32) -> io::Result<Self> {
        Ok(match codec {
            CodecId::None => Encoder::None(writer),
            CodecId::Gzip => {
                let level = level.clamp(0, 9) as u32;
                Encoder::Gzip(GzEncoder::new(writer, Compression::new(level)))
            }
            CodecId::Zstd => Encoder::Zstd(zstd::stream::write::Encoder::new(writer, level)?),
            CodecId::Lz4  => Encoder::Lz4(lz4_flex::frame::FrameEncoder::new(writer)),
        })
    }

    /// Flush the codec trailer and hand back the underlying sink.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Encoder::None(mut w) => {
                w.flush()?;
                Ok(w)
            }
            Encoder::Gzip(e) => e.finish(),
            Encoder::Zstd(e) => e.finish(),
            Encoder::Lz4(e)  => e.finish().map_err(|e| io::Error::new(io::ErrorKind::Other, e)),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Encoder::None(w) => w.write(buf),
            Encoder::Gzip(e) => e.write(buf),
            Encoder::Zstd(e) => e.write(buf),
            Encoder::Lz4(e)  => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Encoder::None(w) => w.flush(),
            Encoder::Gzip(e) => e.flush(),
            Encoder::Zstd(e) => e.flush(),
            Encoder::Lz4(e)  => e.flush(),
        }
    }
}

// ── Decoding ─────────────────────────────────────────────────────────────────

/// A stream with its peeked prefix put back in front.
pub type Peeked<R> = io::Chain<Cursor<Vec<u8>>, R>;

/// Read up to `n` bytes from the front of `reader` and return them together
/// with a reader that yields the same bytes again, followed by the rest.
pub fn peek<R: Read>(mut reader: R, n: usize) -> io::Result<(Vec<u8>, Peeked<R>)> {
    let mut prefix = vec![0u8; n];
    let mut filled = 0;
    while filled < n {
        match reader.read(&mut prefix[filled..]) {
            Ok(0) => break,
            Ok(k) => filled += k,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    prefix.truncate(filled);
    let replay = Cursor::new(prefix.clone()).chain(reader);
    Ok((prefix, replay))
}

/// Read side of a transform.
pub enum Decoder<R: Read> {
    None(R),
    Gzip(MultiGzDecoder<R>),
    Zstd(zstd::stream::read::Decoder<'static, io::BufReader<R>>),
    Lz4(lz4_flex::frame::FrameDecoder<R>),
}

impl<R: Read> Decoder<Peeked<R>> {
    /// Sniff the magic prefix and wrap the stream in the matching decoder.
    pub fn detect(reader: R) -> io::Result<Self> {
        let (prefix, replay) = peek(reader, MAX_MAGIC_LEN)?;
        let codec = CodecId::detect(&prefix);
        tracing::debug!(codec = codec.name(), "detected container transform");
        Decoder::new(replay, codec)
    }
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R, codec: CodecId) -> io::Result<Self> {
        Ok(match codec {
            CodecId::None => Decoder::None(reader),
            CodecId::Gzip => Decoder::Gzip(MultiGzDecoder::new(reader)),
            CodecId::Zstd => Decoder::Zstd(zstd::stream::read::Decoder::new(reader)?),
            CodecId::Lz4  => Decoder::Lz4(lz4_flex::frame::FrameDecoder::new(reader)),
        })
    }

    pub fn codec(&self) -> CodecId {
        match self {
            Decoder::None(_) => CodecId::None,
            Decoder::Gzip(_) => CodecId::Gzip,
            Decoder::Zstd(_) => CodecId::Zstd,
            Decoder::Lz4(_)  => CodecId::Lz4,
        }
    }
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Decoder::None(r) => r.read(buf),
            Decoder::Gzip(d) => d.read(buf),
            Decoder::Zstd(d) => d.read(buf),
            Decoder::Lz4(d)  => d.read(buf),
        }
    }
}
