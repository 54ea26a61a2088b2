//! ZIP archive decoding.
//!
//! ## Architecture
//!
//! - [`structures`]: ZIP format records (EOCD, ZIP64 EOCD, central directory entries)
//! - [`parser`]: locating and parsing those records from raw bytes
//! - [`reader`]: a sequential cursor that yields entry headers and
//!   decompressed data blocks
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Entries are visited in central directory order, which is the order
//! the archiver wrote them.
//!
//! ## Supported Features
//!
//! - ZIP64 extensions for archives and members larger than 4GB
//! - STORED and DEFLATE methods, with CRC-32 verification
//! - Unix permission bits from external attributes
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

mod entry;
mod parser;
mod reader;
mod structures;

pub use entry::{Entry, EntryKind};
pub use parser::ZipParser;
pub use reader::{ArchiveReader, DEFAULT_BLOCK_SIZE, DataBlock};
pub use structures::*;
