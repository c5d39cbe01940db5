//! Pull-request publisher port for pushing generated files back to the host.

use serde::{Deserialize, Serialize};

use super::repository::RepoRef;
use super::PortFuture;
use crate::model::FileRecord;

/// Whether a publish call succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    /// Files landed on the branch.
    Success,
    /// The host rejected the change.
    Error,
}

/// Result of a publish call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    /// Overall status.
    pub status: PublishStatus,
    /// Pull request, compare, or commit URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Human-readable summary.
    pub message: String,
}

impl PublishOutcome {
    /// A failed outcome with the given message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self { status: PublishStatus::Error, url: None, message: message.into() }
    }
}

/// Commits files to a working branch and opens a pull request for them.
pub trait PullRequestPublisher: Send + Sync {
    /// Commits a single file and opens (or reuses) a pull request.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures; host rejections are reported
    /// as a [`PublishStatus::Error`] outcome.
    fn commit_file<'a>(
        &'a self,
        repo: &'a RepoRef,
        path: &'a str,
        content: &'a str,
    ) -> PortFuture<'a, PublishOutcome>;

    /// Commits every file in one commit and opens (or reuses) a pull request.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures; host rejections are reported
    /// as a [`PublishStatus::Error`] outcome.
    fn publish_files<'a>(
        &'a self,
        repo: &'a RepoRef,
        files: &'a [FileRecord],
    ) -> PortFuture<'a, PublishOutcome>;
}
