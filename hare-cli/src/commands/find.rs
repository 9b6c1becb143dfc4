//! `hare find` and `hare clean`.
//!
//! A needle on the command line cannot carry a NUL byte, so `--needle-file`
//! reads the raw needle bytes from a file instead.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use hare_core::exit::{EXIT_NO_MATCH, EXIT_SUCCESS};
use hare_core::types::MatchRequest;
use hare_matcher::find_matching_file;
use hare_stamp::delete_matching_file;

#[derive(Args, Debug)]
pub struct FindArgs {
    /// Directory tree to search.
    pub root: PathBuf,

    /// Filename suffix to look for.
    #[arg(required_unless_present = "needle_file", conflicts_with = "needle_file")]
    pub needle: Option<String>,

    /// Read the needle's raw bytes from this file.
    #[arg(long)]
    pub needle_file: Option<PathBuf>,
}

impl FindArgs {
    pub fn find(self) -> Result<i32> {
        let request = MatchRequest::new(&self.root, self.needle_bytes()?);
        let found = find_matching_file(&request)
            .with_context(|| format!("search under {} failed", self.root.display()))?;
        Ok(report(found))
    }

    pub fn clean(self) -> Result<i32> {
        let needle = self.needle_bytes()?;
        let deleted = delete_matching_file(&self.root, &needle)
            .with_context(|| format!("cleanup under {} failed", self.root.display()))?;
        Ok(report(deleted))
    }

    fn needle_bytes(&self) -> Result<Vec<u8>> {
        match (&self.needle, &self.needle_file) {
            (_, Some(path)) => std::fs::read(path)
                .with_context(|| format!("failed to read needle from {}", path.display())),
            (Some(needle), None) => Ok(needle.as_bytes().to_vec()),
            (None, None) => anyhow::bail!("a needle or --needle-file is required"),
        }
    }
}

fn report(path: Option<PathBuf>) -> i32 {
    match path {
        Some(path) => {
            println!("{}", path.display());
            EXIT_SUCCESS
        }
        None => {
            eprintln!("no matching file");
            EXIT_NO_MATCH
        }
    }
}
