use std::sync::Mutex;

use super::replay_result;
use crate::cassette::ports::REPO;
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::repository::{RepoRef, RepoTree, RepositoryReader, TreeEntry};
use crate::ports::PortFuture;

/// Serves recorded repository reads.
pub struct ReplayingRepository {
    replayer: Mutex<CassetteReplayer>,
}

impl ReplayingRepository {
    /// Replays from `replayer`.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self { replayer: Mutex::new(replayer) }
    }
}

impl RepositoryReader for ReplayingRepository {
    fn default_branch<'a>(&'a self, _repo: &'a RepoRef) -> PortFuture<'a, String> {
        let result = replay_result(&self.replayer, REPO, "default_branch");
        Box::pin(async move { result })
    }

    fn tree<'a>(&'a self, _repo: &'a RepoRef, _branch: &'a str) -> PortFuture<'a, RepoTree> {
        let result = replay_result(&self.replayer, REPO, "tree");
        Box::pin(async move { result })
    }

    fn fetch_file<'a>(
        &'a self,
        _repo: &'a RepoRef,
        _branch: &'a str,
        _entry: &'a TreeEntry,
    ) -> PortFuture<'a, Option<String>> {
        let result = replay_result(&self.replayer, REPO, "fetch_file");
        Box::pin(async move { result })
    }
}
