//! `revive scan` command.

use serde_json::json;

use super::print_json_line;
use crate::context::ServiceContext;
use crate::ports::RepoRef;
use crate::scan::list_paths;

/// Execute the `scan` command: print `{"files": [...]}` for every blob in the repository.
///
/// # Errors
///
/// Returns an error string if no branch of the repository can be listed.
pub async fn run(ctx: &ServiceContext, repo: &RepoRef) -> Result<(), String> {
    let files = list_paths(ctx.repo.as_ref(), repo).await?;
    tracing::info!(%repo, files = files.len(), "listed repository");
    print_json_line(&json!({ "files": files }))
}
