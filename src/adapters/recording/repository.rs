use serde_json::json;

use super::record_result;
use crate::cassette::ports::REPO;
use crate::cassette::session::SharedRecorder;
use crate::ports::repository::{RepoRef, RepoTree, RepositoryReader, TreeEntry};
use crate::ports::PortFuture;

/// Records repository reads.
pub struct RecordingRepository {
    inner: Box<dyn RepositoryReader>,
    recorder: SharedRecorder,
}

impl RecordingRepository {
    /// Wraps `inner`.
    pub fn new(inner: Box<dyn RepositoryReader>, recorder: SharedRecorder) -> Self {
        Self { inner, recorder }
    }
}

impl RepositoryReader for RecordingRepository {
    fn default_branch<'a>(&'a self, repo: &'a RepoRef) -> PortFuture<'a, String> {
        Box::pin(async move {
            let result = self.inner.default_branch(repo).await;
            record_result(&self.recorder, REPO, "default_branch", json!({ "repo": repo }), &result);
            result
        })
    }

    fn tree<'a>(&'a self, repo: &'a RepoRef, branch: &'a str) -> PortFuture<'a, RepoTree> {
        Box::pin(async move {
            let result = self.inner.tree(repo, branch).await;
            let input = json!({ "repo": repo, "branch": branch });
            record_result(&self.recorder, REPO, "tree", input, &result);
            result
        })
    }

    fn fetch_file<'a>(
        &'a self,
        repo: &'a RepoRef,
        branch: &'a str,
        entry: &'a TreeEntry,
    ) -> PortFuture<'a, Option<String>> {
        Box::pin(async move {
            let result = self.inner.fetch_file(repo, branch, entry).await;
            let input = json!({ "repo": repo, "branch": branch, "path": entry.path });
            record_result(&self.recorder, REPO, "fetch_file", input, &result);
            result
        })
    }
}
