//! `revive analyze` command.

use super::print_events;
use crate::analysis::{analyze, AnalysisError};
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::orchestrator::channel;
use crate::ports::RepoRef;

/// Execute the `analyze` command, streaming `log`, `files` and `analysis` events.
///
/// # Errors
///
/// Returns an error string if the scan fails or stdout cannot be written.
pub async fn run(ctx: &ServiceContext, settings: &Settings, repo: &RepoRef) -> Result<(), String> {
    let (sink, rx) = channel();
    let (analysis, printed) = tokio::join!(analyze(ctx, settings, repo, sink), print_events(rx));
    printed?;
    match analysis {
        Ok(()) | Err(AnalysisError::Cancelled(_)) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}
