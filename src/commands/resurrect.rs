//! `revive resurrect` command.

use super::print_events;
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::orchestrator::{channel, Orchestrator, ResurrectRequest};
use crate::ports::RepoRef;

/// Execute the `resurrect` command, streaming NDJSON events until the `result` event.
///
/// # Errors
///
/// Returns an error string if stdout cannot be written; the run itself
/// reports failures inside its `result` event.
pub async fn run(
    ctx: &ServiceContext,
    settings: &Settings,
    repo: RepoRef,
    instructions: &str,
) -> Result<(), String> {
    let request = ResurrectRequest { repo, instructions: instructions.to_string() };
    let orchestrator = Orchestrator::new(ctx, settings);
    let (sink, rx) = channel();
    let (run, printed) = tokio::join!(orchestrator.run(&request, sink), print_events(rx));
    if let Err(cancelled) = run {
        tracing::warn!("{cancelled}");
    }
    printed
}
