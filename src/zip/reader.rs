//! Sequential access to the members of a ZIP archive.
//!
//! [`ArchiveReader`] walks the central directory in order. For each entry
//! it yields an [`Entry`] header and then the entry's uncompressed bytes as
//! a series of [`DataBlock`]s, each at most `block_size` bytes long. The
//! CRC-32 and size recorded in the archive are checked once the last block
//! has been produced.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use flate2::{Crc, Decompress, FlushDecompress, Status};

use crate::io::{LocalFileReader, ReadAt};

use super::entry::Entry;
use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Read chunk size used when the caller has no preference.
pub const DEFAULT_BLOCK_SIZE: usize = 10240;

/// A run of uncompressed entry bytes starting at `offset` within the entry.
#[derive(Debug)]
pub struct DataBlock<'a> {
    pub offset: u64,
    pub data: &'a [u8],
}

/// Sequential cursor over the entries of a ZIP archive.
pub struct ArchiveReader<R: ReadAt> {
    parser: ZipParser<R>,
    entries: std::vec::IntoIter<ZipFileEntry>,
    block_size: usize,
    stream: Option<EntryStream>,
    out: Vec<u8>,
}

impl ArchiveReader<LocalFileReader> {
    /// Open the archive at `path`.
    pub async fn open_filename(path: &Path, block_size: usize) -> Result<Self> {
        let reader = LocalFileReader::new(path)?;
        Self::open(Arc::new(reader), block_size).await
    }
}

impl<R: ReadAt> ArchiveReader<R> {
    /// Detect the format and load the central directory.
    pub async fn open(reader: Arc<R>, block_size: usize) -> Result<Self> {
        let block_size = block_size.max(1);
        let parser = ZipParser::new(reader);
        let entries = parser.list_files().await?;

        Ok(Self {
            parser,
            entries: entries.into_iter(),
            block_size,
            stream: None,
            out: vec![0u8; block_size],
        })
    }

    /// Advance to the next entry, abandoning unread data of the current one.
    ///
    /// Returns `None` at the end of the archive.
    pub async fn next_header(&mut self) -> Result<Option<Entry>> {
        self.stream = None;

        let Some(zip_entry) = self.entries.next() else {
            return Ok(None);
        };

        let data_offset = self.parser.get_data_offset(&zip_entry).await?;

        let entry = Entry::from_zip(&zip_entry);
        self.stream = Some(EntryStream::new(zip_entry, data_offset));
        Ok(Some(entry))
    }

    /// Produce the next block of the current entry's data.
    ///
    /// Returns `None` once the entry is exhausted and verified.
    pub async fn read_data_block(&mut self) -> Result<Option<DataBlock<'_>>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        let reader: &R = self.parser.reader();
        match stream.next_block(reader, &mut self.out, self.block_size).await? {
            Some((offset, len)) => Ok(Some(DataBlock {
                offset,
                data: &self.out[..len],
            })),
            None => {
                self.stream = None;
                Ok(None)
            }
        }
    }

    /// Release the archive.
    pub fn close(self) {
        log::debug!("archive closed");
    }
}

enum Decoder {
    Stored,
    Deflate(Box<Decompress>),
}

/// Decoding state for the entry being read.
struct EntryStream {
    entry: ZipFileEntry,
    decoder: Decoder,
    /// Archive offset of the next unread compressed byte
    next_in: u64,
    remaining_in: u64,
    input: Vec<u8>,
    input_pos: usize,
    produced: u64,
    crc: Crc,
    stream_end: bool,
}

impl EntryStream {
    fn new(entry: ZipFileEntry, data_offset: u64) -> Self {
        let decoder = match entry.compression_method {
            // Raw deflate: no zlib header inside ZIP members
            CompressionMethod::Deflate => Decoder::Deflate(Box::new(Decompress::new(false))),
            _ => Decoder::Stored,
        };
        Self {
            remaining_in: entry.compressed_size,
            entry,
            decoder,
            next_in: data_offset,
            input: Vec::new(),
            input_pos: 0,
            produced: 0,
            crc: Crc::new(),
            stream_end: false,
        }
    }

    /// Fill `out` with the next run of data; returns its entry offset and length.
    async fn next_block<R: ReadAt + ?Sized>(
        &mut self,
        reader: &R,
        out: &mut [u8],
        block_size: usize,
    ) -> Result<Option<(u64, usize)>> {
        if self.entry.is_encrypted() {
            bail!("{}: encrypted entries are not supported", self.entry.file_name);
        }
        if let CompressionMethod::Unknown(method) = self.entry.compression_method {
            bail!(
                "{}: unsupported compression method {}",
                self.entry.file_name,
                method
            );
        }

        let len = match &mut self.decoder {
            Decoder::Stored => {
                let want = (out.len() as u64).min(self.remaining_in) as usize;
                if want > 0 {
                    reader
                        .read_exact_at(self.next_in, &mut out[..want])
                        .await
                        .with_context(|| format!("{}: truncated entry data", self.entry.file_name))?;
                    self.next_in += want as u64;
                    self.remaining_in -= want as u64;
                }
                want
            }
            Decoder::Deflate(inflater) => loop {
                if self.stream_end {
                    break 0;
                }

                if self.input_pos == self.input.len() && self.remaining_in > 0 {
                    let chunk = (block_size as u64).min(self.remaining_in) as usize;
                    self.input.resize(chunk, 0);
                    reader
                        .read_exact_at(self.next_in, &mut self.input)
                        .await
                        .with_context(|| format!("{}: truncated entry data", self.entry.file_name))?;
                    self.next_in += chunk as u64;
                    self.remaining_in -= chunk as u64;
                    self.input_pos = 0;
                }

                let before_in = inflater.total_in();
                let before_out = inflater.total_out();
                let status = inflater
                    .decompress(&self.input[self.input_pos..], out, FlushDecompress::None)
                    .with_context(|| format!("{}: corrupt deflate stream", self.entry.file_name))?;
                let consumed = (inflater.total_in() - before_in) as usize;
                let produced = (inflater.total_out() - before_out) as usize;
                self.input_pos += consumed;

                if status == Status::StreamEnd {
                    self.stream_end = true;
                }
                if produced > 0 {
                    break produced;
                }
                if self.stream_end {
                    break 0;
                }
                if consumed == 0 && self.input_pos == self.input.len() && self.remaining_in == 0 {
                    bail!("{}: truncated deflate stream", self.entry.file_name);
                }
                if consumed == 0 && self.input_pos < self.input.len() {
                    bail!("{}: deflate stream made no progress", self.entry.file_name);
                }
            },
        };

        if len == 0 {
            self.verify()?;
            return Ok(None);
        }

        let offset = self.produced;
        self.produced += len as u64;
        if self.produced > self.entry.uncompressed_size {
            bail!(
                "{}: data exceeds the recorded size of {} bytes",
                self.entry.file_name,
                self.entry.uncompressed_size
            );
        }
        self.crc.update(&out[..len]);
        Ok(Some((offset, len)))
    }

    fn verify(&self) -> Result<()> {
        if self.produced != self.entry.uncompressed_size {
            bail!(
                "{}: expected {} bytes, got {}",
                self.entry.file_name,
                self.entry.uncompressed_size,
                self.produced
            );
        }
        if self.crc.sum() != self.entry.crc32 {
            bail!(
                "{}: CRC-32 mismatch (expected {:08x}, got {:08x})",
                self.entry.file_name,
                self.entry.crc32,
                self.crc.sum()
            );
        }
        Ok(())
    }
}
