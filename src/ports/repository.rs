//! Repository reader port for listing and fetching files from a hosted repository.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::PortFuture;

/// Owner/name pair identifying a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    /// Account or organisation that owns the repository.
    pub owner: String,
    /// Repository name without any `.git` suffix.
    pub name: String,
}

impl RepoRef {
    /// Parses a `github.com/<owner>/<repo>` URL.
    ///
    /// # Errors
    ///
    /// Returns an error string when the URL does not name a GitHub repository.
    pub fn parse(url: &str) -> Result<Self, String> {
        let pattern = Regex::new(r"github\.com[/:]([^/\s]+)/([^/\s?#]+)")
            .map_err(|e| format!("invalid repository pattern: {e}"))?;
        let caps = pattern
            .captures(url.trim())
            .ok_or_else(|| format!("Not a GitHub repository URL: {url}"))?;
        let name = caps[2].trim_end_matches('/').trim_end_matches(".git").to_string();
        if name.is_empty() {
            return Err(format!("Not a GitHub repository URL: {url}"));
        }
        Ok(Self { owner: caps[1].to_string(), name })
    }

    /// Slug usable as a file name (`owner__name`).
    #[must_use]
    pub fn slug(&self) -> String {
        format!("{}__{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Kind of an entry in a recursive tree listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeEntryKind {
    /// A file.
    Blob,
    /// A directory.
    Tree,
    /// A submodule pointer.
    Commit,
}

/// One entry of a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Slash-separated path relative to the repository root.
    pub path: String,
    /// Entry kind.
    pub kind: TreeEntryKind,
    /// Size in bytes, when reported.
    #[serde(default)]
    pub size: u64,
    /// Object id, when reported.
    #[serde(default)]
    pub sha: Option<String>,
}

/// A recursive tree listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoTree {
    /// Entries in host order.
    pub entries: Vec<TreeEntry>,
    /// Set when the host cut the listing short.
    #[serde(default)]
    pub truncated: bool,
}

/// Reads repository metadata and file contents from a hosting service.
pub trait RepositoryReader: Send + Sync {
    /// Returns the repository's default branch name.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be queried.
    fn default_branch<'a>(&'a self, repo: &'a RepoRef) -> PortFuture<'a, String>;

    /// Lists every entry reachable from `branch`.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch does not exist or the listing fails.
    fn tree<'a>(&'a self, repo: &'a RepoRef, branch: &'a str) -> PortFuture<'a, RepoTree>;

    /// Fetches the text content of one blob, or `None` if it cannot be found.
    ///
    /// # Errors
    ///
    /// Returns an error for failures other than "not found".
    fn fetch_file<'a>(
        &'a self,
        repo: &'a RepoRef,
        branch: &'a str,
        entry: &'a TreeEntry,
    ) -> PortFuture<'a, Option<String>>;
}
