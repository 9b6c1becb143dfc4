//! `hare stamp`: stamp-and-move outside of a daemon.

use std::path::PathBuf;

use clap::Args;

use hare_core::exit::EXIT_SUCCESS;
use hare_stamp::stamp_and_move;

#[derive(Args, Debug)]
pub struct StampArgs {
    /// Regular file to move.
    pub file: PathBuf,

    /// Existing directory to move it into.
    pub dest_dir: PathBuf,
}

impl StampArgs {
    pub fn run(self) -> i32 {
        match stamp_and_move(&self.file, &self.dest_dir) {
            Ok(destination) => {
                println!("{}", destination.display());
                EXIT_SUCCESS
            }
            Err(err) => {
                eprintln!("stamp failed: {err}");
                err.exit_code()
            }
        }
    }
}
