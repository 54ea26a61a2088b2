//! Filesystem sink for extracted entries.
//!
//! [`DiskWriter`] turns an entry header into a file or directory at the
//! entry's (already rewritten) pathname, accepts the entry's data in
//! offset-addressed blocks, and applies metadata once the entry is finished.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::zip::{Entry, EntryKind};

/// Behaviour switches for [`DiskWriter`].
#[derive(Debug, Clone, Copy)]
pub struct DiskWriterOptions {
    /// Apply the permission bits recorded in each entry.
    pub preserve_permissions: bool,
}

impl Default for DiskWriterOptions {
    fn default() -> Self {
        Self {
            preserve_permissions: true,
        }
    }
}

/// The entry currently being materialized.
struct OpenEntry {
    path: PathBuf,
    mode: Option<u32>,
    size: u64,
    /// `None` for directories
    file: Option<File>,
    position: u64,
}

/// Owner bits kept on a directory while entries are still written into it
const MIN_DIR_MODE: u32 = 0o700;

/// Writes archive entries to the local filesystem.
///
/// Directory permissions are deferred until [`DiskWriter::close`], so a
/// read-only directory entry does not block the entries stored under it.
pub struct DiskWriter {
    options: DiskWriterOptions,
    current: Option<OpenEntry>,
    /// Directories whose final mode is applied on close
    deferred_modes: Vec<(PathBuf, u32)>,
}

impl DiskWriter {
    pub fn new(options: DiskWriterOptions) -> Self {
        Self {
            options,
            current: None,
            deferred_modes: Vec::new(),
        }
    }

    /// Create the filesystem object for `entry` at `entry.pathname()`.
    ///
    /// A previous entry that was never finished is finished first.
    pub async fn write_header(&mut self, entry: &Entry) -> Result<()> {
        if self.current.is_some() {
            self.finish_entry().await?;
        }

        let path = entry.pathname().to_path_buf();
        let file = match entry.kind() {
            EntryKind::Directory => {
                fs::create_dir_all(&path)
                    .await
                    .with_context(|| format!("cannot create directory {}", path.display()))?;
                // Keep it writable (it may be left read-only by an earlier run)
                if let Some(mode) = self.preserved_mode(entry) {
                    apply_mode(&path, (mode & 0o777) | MIN_DIR_MODE).await?;
                }
                None
            }
            // Links that are not materialized keep their target as content
            EntryKind::File | EntryKind::Symlink => Some(create_file(&path).await?),
        };

        log::debug!("opened {} ({} bytes)", path.display(), entry.size());

        self.current = Some(OpenEntry {
            path,
            mode: entry.mode(),
            size: entry.size(),
            file,
            position: 0,
        });
        Ok(())
    }

    /// Write `data` at `offset` within the current entry.
    pub async fn write_data_block(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let Some(open) = self.current.as_mut() else {
            bail!("no entry header has been written");
        };
        // Directories carry no content
        let Some(file) = open.file.as_mut() else {
            return Ok(());
        };

        if offset != open.position {
            file.seek(SeekFrom::Start(offset))
                .await
                .with_context(|| format!("cannot seek in {}", open.path.display()))?;
        }
        file.write_all(data)
            .await
            .with_context(|| format!("cannot write {}", open.path.display()))?;
        open.position = offset + data.len() as u64;
        Ok(())
    }

    /// Flush and close the current entry, then apply its metadata.
    pub async fn finish_entry(&mut self) -> Result<()> {
        let Some(open) = self.current.take() else {
            return Ok(());
        };

        if let Some(mut file) = open.file {
            // A trailing hole never gets a data block
            if open.position < open.size {
                file.set_len(open.size)
                    .await
                    .with_context(|| format!("cannot extend {}", open.path.display()))?;
            }
            file.flush()
                .await
                .with_context(|| format!("cannot flush {}", open.path.display()))?;

            if self.options.preserve_permissions {
                if let Some(mode) = open.mode {
                    apply_mode(&open.path, mode).await?;
                }
            }
        } else if self.options.preserve_permissions {
            if let Some(mode) = open.mode {
                self.deferred_modes.push((open.path, mode));
            }
        }
        Ok(())
    }

    /// Create a symbolic link at `path` pointing to `target`.
    ///
    /// Whatever non-directory already sits at `path` is replaced. The caller
    /// is responsible for checking that `target` is acceptable.
    pub async fn write_symlink(&mut self, path: &Path, target: &str) -> Result<()> {
        if self.current.is_some() {
            self.finish_entry().await?;
        }
        prepare_destination(path).await?;
        create_symlink(target, path).await?;
        log::debug!("linked {} -> {}", path.display(), target);
        Ok(())
    }

    /// Finish any entry still open, apply deferred directory permissions
    /// and release the writer.
    pub async fn close(mut self) -> Result<()> {
        self.finish_entry().await?;

        // Children before parents, so no directory is locked too early
        let mut deferred = std::mem::take(&mut self.deferred_modes);
        deferred.sort_by_key(|(path, _)| std::cmp::Reverse(path.components().count()));
        for (path, mode) in deferred {
            apply_mode(&path, mode).await?;
        }
        Ok(())
    }

    fn preserved_mode(&self, entry: &Entry) -> Option<u32> {
        entry.mode().filter(|_| self.options.preserve_permissions)
    }
}

async fn create_file(path: &Path) -> Result<File> {
    prepare_destination(path).await?;

    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .with_context(|| format!("cannot create {}", path.display()))
}

/// Create missing parents and unlink any non-directory left at `path`.
///
/// Unlinking rather than truncating means a read-only file from an earlier
/// run is replaced, and a link at the destination is never written through.
async fn prepare_destination(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("cannot create directory {}", parent.display()))?;
        }
    }

    if let Ok(metadata) = fs::symlink_metadata(path).await {
        if !metadata.is_dir() {
            fs::remove_file(path)
                .await
                .with_context(|| format!("cannot replace {}", path.display()))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
async fn create_symlink(target: &str, path: &Path) -> Result<()> {
    fs::symlink(target, path)
        .await
        .with_context(|| format!("cannot create link {}", path.display()))
}

#[cfg(not(unix))]
async fn create_symlink(_target: &str, path: &Path) -> Result<()> {
    bail!(
        "cannot create link {}: symbolic links are not supported on this platform",
        path.display()
    )
}

#[cfg(unix)]
async fn apply_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permissions = std::fs::Permissions::from_mode(mode & 0o777);
    fs::set_permissions(path, permissions)
        .await
        .with_context(|| format!("cannot set permissions on {}", path.display()))
}

#[cfg(not(unix))]
async fn apply_mode(path: &Path, mode: u32) -> Result<()> {
    let mut permissions = fs::metadata(path).await?.permissions();
    permissions.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, permissions).await?;
    Ok(())
}
