//! Command dispatch and handlers.

pub mod analyze;
pub mod publish;
pub mod resurrect;
pub mod scan;

use std::env;
use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::cli::Command;
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::orchestrator::RunEvent;
use crate::ports::RepoRef;

/// Environment variable naming a directory to record cassettes into.
pub const RECORD_ENV: &str = "REVIVE_RECORD";

/// Dispatch a parsed command to its handler.
///
/// When `REVIVE_RECORD` is set to a directory path, all port interactions are
/// recorded to per-port cassette files under a timestamped subdirectory.
///
/// # Errors
///
/// Returns an error string if settings are invalid or the selected command fails.
pub fn dispatch(command: &Command) -> Result<(), String> {
    let settings = Settings::from_env()?;
    let ctx = match env::var(RECORD_ENV) {
        Ok(root) => ServiceContext::recording_at(&PathBuf::from(root), &settings)?,
        Err(_) => ServiceContext::live(&settings),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {e}"))?;
    let result = runtime.block_on(dispatch_with_context(command, &ctx, &settings));

    // Write cassettes even when the command failed.
    if let Some(dir) = ctx.finish()? {
        eprintln!("Recording saved to: {}", dir.display());
    }
    result
}

/// Dispatch a command with the given service context.
async fn dispatch_with_context(
    command: &Command,
    ctx: &ServiceContext,
    settings: &Settings,
) -> Result<(), String> {
    match command {
        Command::Scan { repo_url } => scan::run(ctx, &RepoRef::parse(repo_url)?).await,
        Command::Analyze { repo_url } => {
            analyze::run(ctx, settings, &RepoRef::parse(repo_url)?).await
        }
        Command::Resurrect { repo_url, instructions } => {
            resurrect::run(ctx, settings, RepoRef::parse(repo_url)?, instructions).await
        }
        Command::Commit { repo_url, path, content_file } => {
            publish::commit(ctx, &RepoRef::parse(repo_url)?, path, content_file).await
        }
        Command::CreatePr { repo_url, files } => {
            publish::create_pr(ctx, &RepoRef::parse(repo_url)?, files).await
        }
    }
}

/// Prints `value` as one JSON line on stdout.
fn print_json_line<T: Serialize>(value: &T) -> Result<(), String> {
    let line = serde_json::to_string(value).map_err(|e| format!("Failed to encode output: {e}"))?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")
        .and_then(|()| stdout.flush())
        .map_err(|e| format!("Failed to write output: {e}"))
}

/// Prints events as NDJSON until the terminal event, then drops the receiver.
///
/// Returning early (stdout closed) drops the receiver too, which cancels the
/// producer at its next event.
async fn print_events(mut rx: mpsc::Receiver<RunEvent>) -> Result<(), String> {
    while let Some(event) = rx.recv().await {
        print_json_line(&event)?;
        if event.is_terminal() {
            break;
        }
    }
    Ok(())
}
