//! HARE core library: shared domain types, configuration and directory layout.
//!
//! - [`types`]: events, match requests, daemon outcomes
//! - [`config`]: [`Configuration`] and its YAML loader
//! - [`layout`]: watched/processed directory layout probing
//! - [`exit`]: process exit code convention
//! - [`error`]: [`CoreError`]

pub mod config;
pub mod error;
pub mod exit;
pub mod layout;
pub mod types;

pub use config::Configuration;
pub use error::CoreError;
pub use layout::Layout;
pub use types::{ChildExit, DaemonOutcome, Event, MatchRequest, MatchResult, Pid};
