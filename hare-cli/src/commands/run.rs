//! `hare run`: one full harness cycle.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use hare_core::config::load_config;
use hare_core::{Configuration, Layout};
use hare_daemon::{Harness, HarnessReport, DEFAULT_CONTENT};

/// Exit code when the daemon succeeded but the harness checks did not.
const EXIT_VERIFY_FAILED: i32 = 1;

/// Arguments for `hare run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// File whose raw bytes are the base filename to create (may contain NUL).
    pub input: PathBuf,

    /// YAML configuration file.
    #[arg(long, conflicts_with = "root")]
    pub config: Option<PathBuf>,

    /// Layout root to use instead of probing /ramdisk, /tmp and ./
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Contents of the test file. Defaults to a short fixed text.
    #[arg(long)]
    pub content_file: Option<PathBuf>,

    /// Start the daemon without root privileges.
    #[arg(long)]
    pub allow_unprivileged: bool,

    /// Daemon polling interval in milliseconds.
    #[arg(long)]
    pub poll_ms: Option<u64>,

    /// Give up after this many empty polls.
    #[arg(long)]
    pub max_idle_polls: Option<u32>,

    /// Log file for the detached daemon.
    #[arg(long)]
    pub daemon_log: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<i32> {
        let config = self.configuration()?;
        let content = match &self.content_file {
            Some(path) => std::fs::read(path)
                .with_context(|| format!("failed to read content from {}", path.display()))?,
            None => DEFAULT_CONTENT.to_vec(),
        };

        let report = match Harness::new(config).run_from_file(&self.input, &content) {
            Ok(report) => report,
            Err(err) => {
                eprintln!("{} {err}", "harness failed:".red().bold());
                return Ok(err.exit_code());
            }
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render report JSON")?
            );
        } else {
            print_table(&report);
        }

        Ok(match report.exit_code {
            0 if report.passed() => 0,
            0 => EXIT_VERIFY_FAILED,
            code => code,
        })
    }

    fn configuration(&self) -> Result<Configuration> {
        let mut config = match (&self.config, &self.root) {
            (Some(path), _) => load_config(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            (None, Some(root)) => Configuration::from_layout(&Layout::new(root)),
            (None, None) => Configuration::from_layout(&Layout::probe()),
        };
        if self.allow_unprivileged {
            config.require_root = false;
        }
        if let Some(ms) = self.poll_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(limit) = self.max_idle_polls {
            config.max_idle_polls = Some(limit);
        }
        if let Some(log) = &self.daemon_log {
            config.daemon_log = Some(log.clone());
        }
        tracing::debug!(?config, "harness configuration");
        Ok(config)
    }
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "check")]
    check: &'static str,
    #[tabled(rename = "result")]
    result: String,
}

fn print_table(report: &HarnessReport) {
    let verdict = if report.passed() {
        "PASS".green().bold()
    } else {
        "FAIL".red().bold()
    };
    println!("HARE v{} | daemon {} | {verdict}", env!("CARGO_PKG_VERSION"), report.pid);

    let rows = vec![
        ReportRow {
            check: "exit code",
            result: format!("{} ({})", report.exit_code, report.description),
        },
        ReportRow {
            check: "source",
            result: report.source.clone(),
        },
        ReportRow {
            check: "source removed",
            result: yes_no(report.source_removed),
        },
        ReportRow {
            check: "processed",
            result: report.processed.clone().unwrap_or_else(|| "-".into()),
        },
        ReportRow {
            check: "content verified",
            result: yes_no(report.content_verified),
        },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn yes_no(ok: bool) -> String {
    if ok {
        "yes".green().to_string()
    } else {
        "no".red().to_string()
    }
}
