//! Main entry point for the unarp CLI application.

use clap::Parser;
use std::process::ExitCode;

use unarp::{Cli, Extractor};

/// Parses arguments, runs the extraction and turns any failure into a
/// single diagnostic line with exit status 1.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version are not failures
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .init();

    let extractor = Extractor::new(&cli.archive, &cli.directory).with_options(cli.extract_options());
    match extractor.run().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
