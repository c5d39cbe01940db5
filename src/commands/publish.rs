//! `revive commit` and `revive create-pr` commands.

use std::path::Path;

use serde::Deserialize;

use super::print_json_line;
use crate::context::ServiceContext;
use crate::model::FileRecord;
use crate::ports::{PublishOutcome, PublishStatus, RepoRef};

/// Accepted shapes of a `--files` document.
#[derive(Deserialize)]
#[serde(untagged)]
enum FileList {
    Files(Vec<FileRecord>),
    Report { artifacts: Vec<FileRecord> },
}

/// Reads a file list: either `[{path, content}]` or a saved result carrying `artifacts`.
///
/// # Errors
///
/// Returns an error string if the file cannot be read or is neither shape.
pub fn load_files(path: &Path) -> Result<Vec<FileRecord>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let list: FileList = serde_json::from_str(&text)
        .map_err(|e| format!("{} is not a file list or saved result: {e}", path.display()))?;
    let files = match list {
        FileList::Files(files) | FileList::Report { artifacts: files } => files,
    };
    if files.is_empty() {
        return Err(format!("{} lists no files", path.display()));
    }
    Ok(files)
}

fn report(outcome: &PublishOutcome) -> Result<(), String> {
    print_json_line(outcome)?;
    match outcome.status {
        PublishStatus::Success => Ok(()),
        PublishStatus::Error => Err(outcome.message.clone()),
    }
}

/// Execute the `commit` command.
///
/// # Errors
///
/// Returns an error string if the content file cannot be read or the host rejects the commit.
pub async fn commit(
    ctx: &ServiceContext,
    repo: &RepoRef,
    path: &str,
    content_file: &Path,
) -> Result<(), String> {
    let content = std::fs::read_to_string(content_file)
        .map_err(|e| format!("Failed to read {}: {e}", content_file.display()))?;
    let outcome = ctx
        .publisher
        .commit_file(repo, path, &content)
        .await
        .unwrap_or_else(|e| PublishOutcome::error(format!("Commit failed: {e}")));
    report(&outcome)
}

/// Execute the `create-pr` command.
///
/// # Errors
///
/// Returns an error string if the file list is unusable or the host rejects the change.
pub async fn create_pr(ctx: &ServiceContext, repo: &RepoRef, files: &Path) -> Result<(), String> {
    let files = load_files(files)?;
    tracing::info!(%repo, files = files.len(), "publishing files");
    let outcome = ctx
        .publisher
        .publish_files(repo, &files)
        .await
        .unwrap_or_else(|e| PublishOutcome::error(format!("Publish failed: {e}")));
    report(&outcome)
}
