//! Error type for the extraction loop.
//!
//! Every failure is tagged with the [`Stage`] that produced it so the
//! binary can print a single `"<operation>: <message>"` line and exit.

use std::fmt;
use std::io;

/// The operation that was running when extraction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Mkdir,
    OpenArchive,
    ReadHeader,
    ResolvePath,
    WriteHeader,
    ReadDataBlock,
    WriteDataBlock,
    FinishEntry,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Mkdir => "mkdir",
            Stage::OpenArchive => "open archive",
            Stage::ReadHeader => "read header",
            Stage::ResolvePath => "resolve path",
            Stage::WriteHeader => "write header",
            Stage::ReadDataBlock => "read data block",
            Stage::WriteDataBlock => "write data block",
            Stage::FinishEntry => "finish entry",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// A directory could not be created; carries the OS error.
    #[error("{stage}: {source}")]
    Os { stage: Stage, source: io::Error },

    /// The decoder or the disk writer reported a failure.
    #[error("{stage}: {message}")]
    Archive { stage: Stage, message: String },

    #[error("{stage}: {pathname}: path escapes the output directory")]
    UnsafePath { stage: Stage, pathname: String },
}

impl ExtractError {
    pub fn os(stage: Stage, source: io::Error) -> Self {
        ExtractError::Os { stage, source }
    }

    pub fn archive(stage: Stage, err: anyhow::Error) -> Self {
        ExtractError::Archive {
            stage,
            message: format!("{err:#}"),
        }
    }

    pub fn unsafe_path(pathname: impl Into<String>) -> Self {
        ExtractError::UnsafePath {
            stage: Stage::ResolvePath,
            pathname: pathname.into(),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            ExtractError::Os { stage, .. }
            | ExtractError::Archive { stage, .. }
            | ExtractError::UnsafePath { stage, .. } => *stage,
        }
    }
}

/// Attach a [`Stage`] to a decoder or writer result.
pub trait StageExt<T> {
    fn at(self, stage: Stage) -> Result<T, ExtractError>;
}

impl<T> StageExt<T> for anyhow::Result<T> {
    fn at(self, stage: Stage) -> Result<T, ExtractError> {
        self.map_err(|err| ExtractError::archive(stage, err))
    }
}
