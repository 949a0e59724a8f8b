//! Little-endian fixed-width integers.
//!
//! Every multi-byte integer in a container is unsigned little-endian,
//! independent of host byte order.  `read_u16_le` is the one read that
//! distinguishes a clean end of stream from a failure: it is how the frame
//! decoder learns that no entries remain.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub fn write_u16_le<W: Write>(mut writer: W, value: u16) -> io::Result<()> {
    writer.write_u16::<LittleEndian>(value)
}

pub fn write_u32_le<W: Write>(mut writer: W, value: u32) -> io::Result<()> {
    writer.write_u32::<LittleEndian>(value)
}

/// Read a u16, or `None` when the stream ends before two bytes arrive.
pub fn read_u16_le<R: Read>(mut reader: R) -> io::Result<Option<u16>> {
    let mut buf = [0u8; 2];
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    match filled {
        2 => Ok(Some(u16::from_le_bytes(buf))),
        0 => Ok(None),
        _ => {
            tracing::warn!("ignoring dangling trailing byte at end of container");
            Ok(None)
        }
    }
}

pub fn read_u32_le<R: Read>(mut reader: R) -> io::Result<u32> {
    reader.read_u32::<LittleEndian>()
}
