//! The extraction loop.
//!
//! [`Extractor::run`] opens the archive, makes sure the output directory
//! exists, and materializes every entry in archive order. The first
//! failure ends the run; entries written before it stay on disk.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use tokio::fs::DirBuilder;

use crate::error::{ExtractError, Stage, StageExt};
use crate::io::{DiskWriter, DiskWriterOptions, ReadAt};
use crate::path::{crosses_link, resolve_destination, resolve_link_target};
use crate::zip::{ArchiveReader, DEFAULT_BLOCK_SIZE, EntryKind};

/// Mode for directories created by the extractor itself
#[cfg(unix)]
const DIR_MODE: u32 = 0o755;

/// Pathname some archivers record for the archive root
const ROOT_MARKER: &str = "/";

/// Longest link target accepted (Linux `PATH_MAX`)
const MAX_LINK_TARGET: usize = 4096;

#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Chunk size for archive reads and decoded blocks
    pub block_size: usize,
    /// Apply the permission bits recorded in the archive
    pub preserve_permissions: bool,
    /// Do not print an `extracting` line per entry
    pub quiet: bool,
    /// Create symbolic links for link entries instead of regular files
    pub symlinks: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            preserve_permissions: true,
            quiet: false,
            symlinks: false,
        }
    }
}

/// A link entry, created once every other entry is on disk.
struct PendingLink {
    name: String,
    path: PathBuf,
    target: String,
    /// Target relative to the output directory
    resolved: String,
}

pub struct Extractor {
    archive: PathBuf,
    output_dir: PathBuf,
    options: ExtractOptions,
}

impl Extractor {
    pub fn new(archive: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            output_dir: output_dir.into(),
            options: ExtractOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    /// Extract the whole archive; returns the number of entries processed.
    pub async fn run(&self) -> Result<usize, ExtractError> {
        ensure_dir(&self.output_dir).await?;

        let mut reader = ArchiveReader::open_filename(&self.archive, self.options.block_size)
            .await
            .at(Stage::OpenArchive)?;
        let mut writer = DiskWriter::new(DiskWriterOptions {
            preserve_permissions: self.options.preserve_permissions,
        });

        let mut processed = 0;
        let mut links = Vec::new();
        while let Some(mut entry) = reader.next_header().await.at(Stage::ReadHeader)? {
            let name = entry.name().to_string();
            if name == ROOT_MARKER {
                log::debug!("skipping root marker entry");
                continue;
            }

            let destination = resolve_destination(&self.output_dir, &name)?;
            if !self.options.quiet {
                println!("extracting {}/{}", self.output_dir.display(), name);
            }
            processed += 1;

            // A leading separator marks an explicit directory
            if name.starts_with('/') {
                ensure_dir_all(&destination).await?;
                continue;
            }

            if entry.kind() == EntryKind::Symlink {
                if self.options.symlinks {
                    let target = read_link_target(&mut reader, &name).await?;
                    let resolved = resolve_link_target(&self.output_dir, &name, &target)?;
                    links.push(PendingLink {
                        name,
                        path: destination,
                        target,
                        resolved,
                    });
                    continue;
                }
                log::warn!("{name}: symbolic link stored as a regular file");
            }

            entry.set_pathname(destination);
            writer.write_header(&entry).await.at(Stage::WriteHeader)?;
            copy_data(&mut reader, &mut writer).await?;
            writer.finish_entry().await.at(Stage::FinishEntry)?;
            log::debug!("{} -> {}", name, entry.pathname().display());
        }

        create_links(&self.output_dir, &links, &mut writer).await?;

        reader.close();
        writer.close().await.at(Stage::FinishEntry)?;

        log::info!(
            "extracted {} entries from {} into {}",
            processed,
            self.archive.display(),
            self.output_dir.display()
        );
        Ok(processed)
    }
}

/// Stream every data block of the current entry into the writer.
async fn copy_data<R: ReadAt>(
    reader: &mut ArchiveReader<R>,
    writer: &mut DiskWriter,
) -> Result<(), ExtractError> {
    while let Some(block) = reader.read_data_block().await.at(Stage::ReadDataBlock)? {
        writer
            .write_data_block(block.offset, block.data)
            .await
            .at(Stage::WriteDataBlock)?;
    }
    Ok(())
}

/// Collect the data of a link entry, which is its target.
async fn read_link_target<R: ReadAt>(
    reader: &mut ArchiveReader<R>,
    name: &str,
) -> Result<String, ExtractError> {
    let mut target = Vec::new();
    while let Some(block) = reader.read_data_block().await.at(Stage::ReadDataBlock)? {
        if target.len() + block.data.len() > MAX_LINK_TARGET {
            return Err(ExtractError::archive(
                Stage::ReadDataBlock,
                anyhow!("{name}: link target is too long"),
            ));
        }
        target.extend_from_slice(block.data);
    }
    String::from_utf8(target).map_err(|_| {
        ExtractError::archive(
            Stage::ReadDataBlock,
            anyhow!("{name}: link target is not valid UTF-8"),
        )
    })
}

/// Create the deferred links once no other entry can be written through them.
///
/// A link that would be created inside another link, or whose target walks
/// through one, is rejected before any link is created.
async fn create_links(
    output_dir: &Path,
    links: &[PendingLink],
    writer: &mut DiskWriter,
) -> Result<(), ExtractError> {
    let mut locations = HashSet::new();
    for link in links {
        locations.insert(resolve_destination(Path::new(""), &link.name)?);
    }

    for link in links {
        if crosses_link(&link.name, &locations) || crosses_link(&link.resolved, &locations) {
            return Err(ExtractError::unsafe_path(format!(
                "{} -> {}",
                link.name, link.target
            )));
        }
    }

    for link in links {
        writer
            .write_symlink(&link.path, &link.target)
            .await
            .at(Stage::FinishEntry)?;
        log::debug!("{} -> {}", link.name, link.target);
    }
    log::debug!("created {} links under {}", links.len(), output_dir.display());
    Ok(())
}

/// Create a single directory level, accepting one that already exists.
async fn ensure_dir(path: &Path) -> Result<(), ExtractError> {
    let mut builder = DirBuilder::new();
    #[cfg(unix)]
    builder.mode(DIR_MODE);
    tolerate_existing(builder.create(path).await)
}

/// Create a directory and any missing parents.
async fn ensure_dir_all(path: &Path) -> Result<(), ExtractError> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DIR_MODE);
    tolerate_existing(builder.create(path).await)
}

fn tolerate_existing(result: io::Result<()>) -> Result<(), ExtractError> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(ExtractError::os(Stage::Mkdir, err)),
    }
}
