pub mod header;
pub mod codec;
pub mod digest;
pub mod toc;
pub mod scratch;
pub mod io_stream;
pub mod archive;
pub mod error;
pub mod sys;

pub use header::{ArchiveHeader, HEADER_SIZE};
pub use codec::{CompressorKind, Compressor, get_compressor};
pub use digest::{DigestKind, Digest, get_digest};
pub use toc::{TocEntry, ENTRY_PREFIX_SIZE};
pub use io_stream::{CodecOptions, LarReader, LarWriter};
pub use archive::{pack, unpack, list, PackOptions, UnpackOptions};
pub use error::{ArchiveError, ErrorKind};
