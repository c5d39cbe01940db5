//! Core library entry for the `revive` CLI.
//!
//! A run scans a GitHub repository, asks a language model for a
//! preservation-first modernization plan, regenerates the code, executes it
//! in a remote sandbox and feeds classified failures back into the next
//! attempt. External systems sit behind the traits in [`ports`]; the
//! [`context::ServiceContext`] picks live, recording or replaying adapters.

pub mod adapters;
pub mod analysis;
pub mod batch;
pub mod cassette;
pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod deps;
pub mod entrypoint;
pub mod generation;
pub mod logging;
pub mod memory;
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod plan;
pub mod ports;
pub mod prompts;
pub mod sandbox;
pub mod sanitize;
pub mod scan;

use clap::Parser;

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    logging::init(if cli.verbose { "debug" } else { "info" });
    commands::dispatch(&cli.command)
}
