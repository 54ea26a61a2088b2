use clap::Parser;
use std::path::PathBuf;

use crate::extract::ExtractOptions;

#[derive(Parser, Debug)]
#[command(name = "unarp")]
#[command(version)]
#[command(about = "Extract a ZIP archive into a directory", long_about = None)]
#[command(after_help = "Examples:\n  \
  unarp data.zip out/            extract data.zip into out/\n  \
  unarp -q data.zip out/         extract without listing entries\n  \
  RUST_LOG=debug unarp a.zip d   extract with debug logging")]
pub struct Cli {
    /// ZIP archive to extract
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Directory to extract into (created if missing)
    #[arg(value_name = "DIRECTORY")]
    pub directory: PathBuf,

    /// Do not apply permission bits recorded in the archive
    #[arg(long = "no-same-permissions")]
    pub no_same_permissions: bool,

    /// Create symbolic links for link entries whose target stays inside DIRECTORY
    #[arg(long = "symlinks")]
    pub symlinks: bool,

    /// Quiet mode, no per-entry output
    #[arg(short = 'q')]
    pub quiet: bool,

    /// More log output (-vv => debug)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            preserve_permissions: !self.no_same_permissions,
            quiet: self.quiet,
            symlinks: self.symlinks,
            ..ExtractOptions::default()
        }
    }

    /// Default log filter; `RUST_LOG` takes precedence.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}
