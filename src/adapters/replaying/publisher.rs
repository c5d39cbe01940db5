use std::sync::Mutex;

use super::replay_result;
use crate::cassette::ports::PUBLISHER;
use crate::cassette::replayer::CassetteReplayer;
use crate::model::FileRecord;
use crate::ports::publisher::{PublishOutcome, PullRequestPublisher};
use crate::ports::repository::RepoRef;
use crate::ports::PortFuture;

/// Serves recorded publish outcomes.
pub struct ReplayingPublisher {
    replayer: Mutex<CassetteReplayer>,
}

impl ReplayingPublisher {
    /// Replays from `replayer`.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self { replayer: Mutex::new(replayer) }
    }
}

impl PullRequestPublisher for ReplayingPublisher {
    fn commit_file<'a>(
        &'a self,
        _repo: &'a RepoRef,
        _path: &'a str,
        _content: &'a str,
    ) -> PortFuture<'a, PublishOutcome> {
        let result = replay_result(&self.replayer, PUBLISHER, "commit_file");
        Box::pin(async move { result })
    }

    fn publish_files<'a>(
        &'a self,
        _repo: &'a RepoRef,
        _files: &'a [FileRecord],
    ) -> PortFuture<'a, PublishOutcome> {
        let result = replay_result(&self.replayer, PUBLISHER, "publish_files");
        Box::pin(async move { result })
    }
}
