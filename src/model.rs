//! Shared data model: file records, batches, scan profiles and run results.

use serde::{Deserialize, Serialize};

use crate::classify::ErrorKind;

/// One source file, either scanned from the repository or produced by generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Slash-separated path relative to the repository root.
    pub path: String,
    /// Full text content.
    pub content: String,
    /// Detected language tag, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl FileRecord {
    /// Creates a record without a language tag.
    #[must_use]
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self { path: path.into(), content: content.into(), language: None }
    }

    /// Final path component.
    #[must_use]
    pub fn basename(&self) -> &str {
        basename(&self.path)
    }

    /// Content length in characters, the unit every budget is expressed in.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Final component of a slash-separated path.
#[must_use]
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Extension of a path including the leading dot, lowercased; empty if none.
///
/// Dotfiles such as `.env` have no extension.
#[must_use]
pub fn extension(path: &str) -> String {
    let name = basename(path);
    match name.rfind('.') {
        Some(0) | None => String::new(),
        Some(idx) => name[idx..].to_lowercase(),
    }
}

/// Sum of the character lengths of `files`.
#[must_use]
pub fn total_chars(files: &[FileRecord]) -> usize {
    files.iter().map(FileRecord::char_len).sum()
}

/// A named group of files sent to the generation backend in one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Display name.
    pub name: String,
    /// Member files in planner order.
    pub files: Vec<FileRecord>,
}

impl Batch {
    /// Total content length of the batch.
    #[must_use]
    pub fn char_len(&self) -> usize {
        total_chars(&self.files)
    }
}

/// Backend half of a [`TechStackProfile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStack {
    /// Server framework, e.g. `Flask`.
    pub framework: Option<String>,
    /// Database engine, e.g. `MongoDB`.
    pub database: Option<String>,
    /// Authentication style, e.g. `JWT`.
    pub auth: Option<String>,
}

/// Frontend half of a [`TechStackProfile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendStack {
    /// UI framework, e.g. `React`.
    pub framework: Option<String>,
    /// Styling system, e.g. `Tailwind CSS`.
    pub styling: Option<String>,
}

/// Technology profile derived from a repository scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechStackProfile {
    /// Backend technologies.
    pub backend: BackendStack,
    /// Frontend technologies.
    pub frontend: FrontendStack,
    /// Things the regenerated code must keep intact.
    pub must_preserve: Vec<String>,
    /// Paths that are safe to restyle or restructure.
    pub can_modernize: Vec<String>,
    /// `METHOD /path` strings found in route declarations.
    pub api_endpoints: Vec<String>,
    /// Environment variable names found in config files.
    pub env_vars: Vec<String>,
}

impl TechStackProfile {
    /// One-line summary of the detected stack.
    #[must_use]
    pub fn summary(&self) -> String {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".to_string());
        format!(
            "backend={} database={} auth={} frontend={} styling={}",
            show(&self.backend.framework),
            show(&self.backend.database),
            show(&self.backend.auth),
            show(&self.frontend.framework),
            show(&self.frontend.styling),
        )
    }
}

/// Files plus the profile built from them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSnapshot {
    /// Every fetched file.
    pub files: Vec<FileRecord>,
    /// Profile derived from `files`.
    pub profile: TechStackProfile,
    /// Human-readable preservation summary.
    pub preservation_summary: String,
}

impl ScanSnapshot {
    /// Paths of every scanned file, in scan order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}

/// Runtime family needed to start the generated entrypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    /// CPython.
    Python,
    /// Node.js.
    Node,
}

impl std::fmt::Display for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Python => f.write_str("python"),
            Self::Node => f.write_str("node"),
        }
    }
}

/// Output of one generation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Parsed files.
    pub files: Vec<FileRecord>,
    /// Path of the process entrypoint.
    pub entrypoint: String,
    /// Runtime needed for the entrypoint.
    pub runtime: Runtime,
    /// Expected paths that were never generated.
    #[serde(default)]
    pub missing: Vec<String>,
}

/// One failed attempt inside an orchestration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptError {
    /// One-based attempt number.
    pub attempt: u32,
    /// Classification of the failure.
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    /// Log excerpt or error text.
    pub message: String,
}

/// Terminal status of an orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// The regenerated code started cleanly.
    Resurrected,
    /// Partial or degraded result.
    Fallback,
    /// The run could not proceed at all.
    Error,
}

/// Payload of the terminal `result` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Identifier of the run.
    pub run_id: String,
    /// Every progress line, newline-joined.
    pub logs: String,
    /// Files from the last generation cycle.
    pub artifacts: Vec<FileRecord>,
    /// Preview URL or inline HTML; empty if none.
    pub preview: String,
    /// Terminal status.
    pub status: RunStatus,
    /// Number of retries consumed.
    pub retry_count: u32,
    /// Every recorded attempt failure, in order.
    pub errors: Vec<AttemptError>,
    /// Paths that were never generated.
    #[serde(default)]
    pub missing_files: Vec<String>,
}
