use crate::ports::repository::{RepoRef, RepoTree, RepositoryReader, TreeEntry, TreeEntryKind};
use crate::ports::PortFuture;

/// Repository served from an in-memory file list.
pub struct ScriptedRepository {
    branch: String,
    files: Vec<(String, String)>,
    extra: Vec<TreeEntry>,
}

impl ScriptedRepository {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self {
            branch: "main".to_string(),
            files: files.iter().map(|(p, c)| ((*p).to_string(), (*c).to_string())).collect(),
            extra: Vec::new(),
        }
    }

    /// Adds a tree entry that has no fetchable content.
    pub fn with_entry(mut self, path: &str, size: u64) -> Self {
        self.extra.push(TreeEntry {
            path: path.to_string(),
            kind: TreeEntryKind::Blob,
            size,
            sha: None,
        });
        self
    }
}

impl RepositoryReader for ScriptedRepository {
    fn default_branch<'a>(&'a self, _repo: &'a RepoRef) -> PortFuture<'a, String> {
        Box::pin(async move { Ok(self.branch.clone()) })
    }

    fn tree<'a>(&'a self, _repo: &'a RepoRef, branch: &'a str) -> PortFuture<'a, RepoTree> {
        Box::pin(async move {
            if branch != self.branch {
                return Err(format!("no branch {branch}").into());
            }
            let mut entries: Vec<TreeEntry> = self
                .files
                .iter()
                .map(|(path, content)| TreeEntry {
                    path: path.clone(),
                    kind: TreeEntryKind::Blob,
                    size: content.len() as u64,
                    sha: None,
                })
                .collect();
            entries.extend(self.extra.iter().cloned());
            Ok(RepoTree { entries, truncated: false })
        })
    }

    fn fetch_file<'a>(
        &'a self,
        _repo: &'a RepoRef,
        _branch: &'a str,
        entry: &'a TreeEntry,
    ) -> PortFuture<'a, Option<String>> {
        Box::pin(async move {
            Ok(self.files.iter().find(|(p, _)| *p == entry.path).map(|(_, c)| c.clone()))
        })
    }
}
