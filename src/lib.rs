pub mod error;
pub mod wire;
pub mod header;
pub mod frame;
pub mod codec;
pub mod io_stream;
pub mod locate;
pub mod archive;

pub use error::{ArchiveError, ErrorClass, Result};
pub use header::ContainerHeader;
pub use frame::{Entry, read_frame, write_dir_frame, write_file_header};
pub use codec::CodecId;
pub use io_stream::{ArchiveReader, ArchiveWriter};
pub use locate::{locate, locate_with, EntryReader, LocateListener, Located};
pub use archive::{archive, unarchive, list, ArchiveOptions, Summary};
