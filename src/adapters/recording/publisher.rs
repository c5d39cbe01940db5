use serde_json::json;

use super::record_result;
use crate::cassette::ports::PUBLISHER;
use crate::cassette::session::SharedRecorder;
use crate::model::FileRecord;
use crate::ports::publisher::{PublishOutcome, PullRequestPublisher};
use crate::ports::repository::RepoRef;
use crate::ports::PortFuture;

/// Records publish calls.
pub struct RecordingPublisher {
    inner: Box<dyn PullRequestPublisher>,
    recorder: SharedRecorder,
}

impl RecordingPublisher {
    /// Wraps `inner`.
    pub fn new(inner: Box<dyn PullRequestPublisher>, recorder: SharedRecorder) -> Self {
        Self { inner, recorder }
    }
}

impl PullRequestPublisher for RecordingPublisher {
    fn commit_file<'a>(
        &'a self,
        repo: &'a RepoRef,
        path: &'a str,
        content: &'a str,
    ) -> PortFuture<'a, PublishOutcome> {
        Box::pin(async move {
            let result = self.inner.commit_file(repo, path, content).await;
            let input = json!({ "repo": repo, "path": path });
            record_result(&self.recorder, PUBLISHER, "commit_file", input, &result);
            result
        })
    }

    fn publish_files<'a>(
        &'a self,
        repo: &'a RepoRef,
        files: &'a [FileRecord],
    ) -> PortFuture<'a, PublishOutcome> {
        Box::pin(async move {
            let result = self.inner.publish_files(repo, files).await;
            let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
            let input = json!({ "repo": repo, "paths": paths });
            record_result(&self.recorder, PUBLISHER, "publish_files", input, &result);
            result
        })
    }
}
