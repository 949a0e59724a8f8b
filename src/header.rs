//! Container header: the 16-bit version tag that opens every container.

use std::io::{self, Read, Write};

use crate::error::{ArchiveError, Result};
use crate::wire::{read_u16_le, write_u16_le};

/// Version tag written by this crate.  Readers never validate it.
pub const VERSION: u16 = 1;

/// The two bytes at the start of every container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u16,
}

impl Default for ContainerHeader {
    fn default() -> Self {
        Self { version: VERSION }
    }
}

impl ContainerHeader {
    pub fn write<W: Write>(&self, writer: W) -> io::Result<()> {
        write_u16_le(writer, self.version)
    }

    /// Any version value is accepted; only its presence is required.
    pub fn read<R: Read>(reader: R) -> Result<Self> {
        let version = read_u16_le(reader)?.ok_or(ArchiveError::Truncated("container header"))?;
        if version != VERSION {
            tracing::debug!(version, "container written with a different version tag");
        }
        Ok(Self { version })
    }
}
