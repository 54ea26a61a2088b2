//! # unarp
//!
//! Extract a ZIP archive into a directory, creating intermediate
//! directories and preserving the permission bits recorded in the archive.
//!
//! ## Features
//!
//! - Sequential extraction in archive order with streamed, chunked writes
//! - ZIP64 archives, STORED and DEFLATE members, CRC-32 verification
//! - Destinations bounded to the output directory (`..` cannot escape it)
//! - Fail-fast error reporting tagged with the failing operation
//!
//! ## Example
//!
//! ```no_run
//! use unarp::Extractor;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), unarp::ExtractError> {
//!     let count = Extractor::new("archive.zip", "out").run().await?;
//!     println!("{count} entries extracted");
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod extract;
pub mod io;
pub mod path;
pub mod zip;

#[cfg(test)]
pub(crate) mod test_utils;

pub use cli::Cli;
pub use error::{ExtractError, Stage};
pub use extract::{ExtractOptions, Extractor};
pub use io::{DiskWriter, DiskWriterOptions, LocalFileReader, ReadAt};
pub use self::zip::{ArchiveReader, DataBlock, Entry, EntryKind};
