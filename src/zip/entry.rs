use std::path::{Path, PathBuf};

use super::structures::ZipFileEntry;

/// What kind of filesystem object an entry becomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Symbolic link; the entry data is the link target
    Symlink,
}

/// Header of one archive member, as yielded by
/// [`ArchiveReader::next_header`](super::ArchiveReader::next_header).
///
/// `name` is the pathname stored in the archive and never changes.
/// `pathname` starts out equal to it and is rewritten to the on-disk
/// destination before the entry is handed to a
/// [`DiskWriter`](crate::io::DiskWriter).
#[derive(Debug, Clone)]
pub struct Entry {
    name: String,
    pathname: PathBuf,
    kind: EntryKind,
    mode: Option<u32>,
    size: u64,
}

impl Entry {
    pub fn new(name: impl Into<String>, kind: EntryKind, mode: Option<u32>, size: u64) -> Self {
        let name = name.into();
        Self {
            pathname: PathBuf::from(&name),
            name,
            kind,
            mode,
            size,
        }
    }

    pub(crate) fn from_zip(zip_entry: &ZipFileEntry) -> Self {
        let kind = if zip_entry.is_directory() {
            EntryKind::Directory
        } else if zip_entry.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::File
        };
        Self::new(
            zip_entry.file_name.clone(),
            kind,
            zip_entry.unix_mode(),
            zip_entry.uncompressed_size,
        )
    }

    /// Pathname as stored in the archive
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pathname(&self) -> &Path {
        &self.pathname
    }

    pub fn set_pathname(&mut self, pathname: impl Into<PathBuf>) {
        self.pathname = pathname.into();
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Unix `st_mode`, when the archiver recorded one
    pub fn mode(&self) -> Option<u32> {
        self.mode
    }

    /// Uncompressed size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }
}
