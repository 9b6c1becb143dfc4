//! HARE: emulated directory-watching daemon and its test harness.
//!
//! # Usage
//!
//! ```text
//! hare run <input-file> [--config <yaml>] [--root <dir>] [--content-file <file>] [--json]
//! hare stamp <file> <dest-dir>
//! hare find <root> [<needle>] [--needle-file <file>]
//! hare clean <root> [<needle>] [--needle-file <file>]
//! ```
//!
//! `run` exits with the daemon's own exit code; `stamp` and `clean` exit
//! with the errno of a failed syscall, or 255 for bad input.

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{find::FindArgs, run::RunArgs, stamp::StampArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "hare",
    version,
    about = "Inject a file event, let a forked daemon stamp the file, check the result",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one harness cycle for the base filename stored in a file.
    Run(RunArgs),

    /// Move a file into a directory under a timestamped name.
    Stamp(StampArgs),

    /// Print the first file under a root whose name ends with a needle.
    Find(FindArgs),

    /// Delete the first file under a root whose name ends with a needle.
    Clean(FindArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<ExitCode> {
    hare_daemon::init_tracing();
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Run(args) => args.run()?,
        Commands::Stamp(args) => args.run(),
        Commands::Find(args) => args.find()?,
        Commands::Clean(args) => args.clean()?,
    };
    Ok(exit_code(code))
}

/// Process exit status for a daemon-style code; out-of-range values saturate.
fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX))
}
