//! Helpers for building ZIP archives byte by byte in tests.
//!
//! Unlike a general-purpose ZIP writer, [`ZipBuilder`] stores names, sizes
//! and checksums exactly as given, so tests can produce archives with
//! unusual pathnames or deliberately wrong metadata.

use std::io::Write;

use anyhow::Result;
use async_trait::async_trait;
use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Crc;
use flate2::Compression;
use flate2::write::DeflateEncoder;

use crate::io::ReadAt;
use crate::zip::{
    CDFH_SIGNATURE, EndOfCentralDirectory, LFH_SIGNATURE, Zip64EOCD, Zip64EOCDLocator,
};

/// Value of a 32-bit size or offset field whose real value is in ZIP64 records
const SATURATED: u32 = 0xFFFFFFFF;

/// In-memory archive source
pub(crate) struct MemoryReader {
    data: Vec<u8>,
}

impl MemoryReader {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl ReadAt for MemoryReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let start = (offset as usize).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

/// Writes local headers, a central directory and an EOCD record.
pub(crate) struct ZipBuilder {
    body: Vec<u8>,
    central: Vec<u8>,
    count: u16,
    comment: Vec<u8>,
    zip64: bool,
}

impl ZipBuilder {
    pub(crate) fn new() -> Self {
        Self {
            body: Vec::new(),
            central: Vec::new(),
            count: 0,
            comment: Vec::new(),
            zip64: false,
        }
    }

    /// Record sizes, offsets and the directory location only in ZIP64
    /// structures, saturating every 32-bit field. Affects entries added
    /// afterwards.
    pub(crate) fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    pub(crate) fn stored(self, name: &str, data: &[u8]) -> Self {
        self.stored_with_mode(name, data, 0o100644)
    }

    pub(crate) fn stored_with_mode(self, name: &str, data: &[u8], mode: u32) -> Self {
        self.raw(name, 0, data, crc32(data), data.len() as u64, Some(mode))
    }

    pub(crate) fn deflated(self, name: &str, data: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        let compressed = encoder.finish().unwrap();
        self.raw(
            name,
            8,
            &compressed,
            crc32(data),
            data.len() as u64,
            Some(0o100644),
        )
    }

    pub(crate) fn symlink(self, name: &str, target: &str) -> Self {
        self.stored_with_mode(name, target.as_bytes(), 0o120777)
    }

    pub(crate) fn directory(self, name: &str) -> Self {
        self.raw(name, 0, &[], 0, 0, Some(0o040755))
    }

    /// Append an entry with explicit method, payload, checksum and size.
    ///
    /// `mode` is recorded as Unix `st_mode`; `None` records an MS-DOS entry.
    pub(crate) fn raw(
        mut self,
        name: &str,
        method: u16,
        payload: &[u8],
        crc: u32,
        uncompressed_size: u64,
        mode: Option<u32>,
    ) -> Self {
        let offset = self.body.len() as u64;
        let (version_made_by, external_attrs) = match mode {
            Some(mode) => ((3 << 8) | 20, mode << 16),
            None => (20, 0),
        };
        let compressed_size = payload.len() as u64;
        let (local_extra, central_extra) = if self.zip64 {
            let mut local = Vec::new();
            local.write_u16::<LittleEndian>(0x0001).unwrap();
            local.write_u16::<LittleEndian>(16).unwrap();
            local.write_u64::<LittleEndian>(uncompressed_size).unwrap();
            local.write_u64::<LittleEndian>(compressed_size).unwrap();

            let mut central = Vec::new();
            central.write_u16::<LittleEndian>(0x0001).unwrap();
            central.write_u16::<LittleEndian>(24).unwrap();
            central.write_u64::<LittleEndian>(uncompressed_size).unwrap();
            central.write_u64::<LittleEndian>(compressed_size).unwrap();
            central.write_u64::<LittleEndian>(offset).unwrap();
            (local, central)
        } else {
            (Vec::new(), Vec::new())
        };
        let narrow = |value: u64| if self.zip64 { SATURATED } else { value as u32 };
        let (compressed32, uncompressed32, offset32) = (
            narrow(compressed_size),
            narrow(uncompressed_size),
            narrow(offset),
        );

        let b = &mut self.body;
        b.write_all(LFH_SIGNATURE).unwrap();
        b.write_u16::<LittleEndian>(20).unwrap();
        b.write_u16::<LittleEndian>(0).unwrap();
        b.write_u16::<LittleEndian>(method).unwrap();
        b.write_u16::<LittleEndian>(0).unwrap();
        b.write_u16::<LittleEndian>(0x21).unwrap();
        b.write_u32::<LittleEndian>(crc).unwrap();
        b.write_u32::<LittleEndian>(compressed32).unwrap();
        b.write_u32::<LittleEndian>(uncompressed32).unwrap();
        b.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        b.write_u16::<LittleEndian>(local_extra.len() as u16).unwrap();
        b.write_all(name.as_bytes()).unwrap();
        b.write_all(&local_extra).unwrap();
        b.write_all(payload).unwrap();

        let c = &mut self.central;
        c.write_all(CDFH_SIGNATURE).unwrap();
        c.write_u16::<LittleEndian>(version_made_by).unwrap();
        c.write_u16::<LittleEndian>(20).unwrap();
        c.write_u16::<LittleEndian>(0).unwrap();
        c.write_u16::<LittleEndian>(method).unwrap();
        c.write_u16::<LittleEndian>(0).unwrap();
        c.write_u16::<LittleEndian>(0x21).unwrap();
        c.write_u32::<LittleEndian>(crc).unwrap();
        c.write_u32::<LittleEndian>(compressed32).unwrap();
        c.write_u32::<LittleEndian>(uncompressed32).unwrap();
        c.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        c.write_u16::<LittleEndian>(central_extra.len() as u16).unwrap();
        c.write_u16::<LittleEndian>(0).unwrap();
        c.write_u16::<LittleEndian>(0).unwrap();
        c.write_u16::<LittleEndian>(0).unwrap();
        c.write_u32::<LittleEndian>(external_attrs).unwrap();
        c.write_u32::<LittleEndian>(offset32).unwrap();
        c.write_all(name.as_bytes()).unwrap();
        c.write_all(&central_extra).unwrap();

        self.count += 1;
        self
    }

    pub(crate) fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        let mut out = self.body;
        let cd_offset = out.len() as u64;
        let cd_size = self.central.len() as u64;
        out.extend_from_slice(&self.central);

        let (count, cd_size32, cd_offset32) = if self.zip64 {
            let eocd64_offset = out.len() as u64;
            out.write_all(Zip64EOCD::SIGNATURE).unwrap();
            out.write_u64::<LittleEndian>(Zip64EOCD::MIN_SIZE as u64 - 12).unwrap();
            out.write_u16::<LittleEndian>((3 << 8) | 45).unwrap();
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(self.count as u64).unwrap();
            out.write_u64::<LittleEndian>(self.count as u64).unwrap();
            out.write_u64::<LittleEndian>(cd_size).unwrap();
            out.write_u64::<LittleEndian>(cd_offset).unwrap();

            out.write_all(Zip64EOCDLocator::SIGNATURE).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(eocd64_offset).unwrap();
            out.write_u32::<LittleEndian>(1).unwrap();
            (0xFFFF, SATURATED, SATURATED)
        } else {
            (self.count, cd_size as u32, cd_offset as u32)
        };

        out.write_all(EndOfCentralDirectory::SIGNATURE).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u32::<LittleEndian>(cd_size32).unwrap();
        out.write_u32::<LittleEndian>(cd_offset32).unwrap();
        out.write_u16::<LittleEndian>(self.comment.len() as u16).unwrap();
        out.write_all(&self.comment).unwrap();
        out
    }

    /// Write the archive to `path`.
    pub(crate) fn write_to(self, path: &std::path::Path) {
        std::fs::write(path, self.finish()).unwrap();
    }
}
