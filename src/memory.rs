//! Append-only per-repository log of past orchestration attempts.
//!
//! Each repository gets `<dir>/<owner>__<name>.json`, a JSON array of
//! [`MemoryRecord`]s. The tail of that log is rendered into the first
//! generation prompt of later runs.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::{truncate_chars, ErrorKind};
use crate::ports::repository::RepoRef;
use crate::ports::{Clock, FileSystem};

/// Records rendered into a prompt.
const PROMPT_RECORDS: usize = 5;
/// Upper bound on the rendered prompt context, in characters.
const PROMPT_CHARS: usize = 2000;

/// How an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Scan finished and generation began.
    Started,
    /// The regenerated code ran cleanly.
    Success,
    /// The run gave up.
    Failure,
}

/// One entry of the memory log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// When the record was written.
    pub timestamp: DateTime<Utc>,
    /// Detected stack summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech_stack: Option<String>,
    /// Outcome.
    pub outcome: Outcome,
    /// Failure classification, for failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Choices made during the attempt (runtime, entrypoint, error excerpt).
    #[serde(default)]
    pub decisions: Vec<String>,
}

/// Memory log rooted at a directory.
pub struct AttemptMemory<'a> {
    fs: &'a dyn FileSystem,
    clock: &'a dyn Clock,
    dir: PathBuf,
}

impl<'a> AttemptMemory<'a> {
    /// A store that keeps its logs under `dir`.
    pub fn new(fs: &'a dyn FileSystem, clock: &'a dyn Clock, dir: impl AsRef<Path>) -> Self {
        Self { fs, clock, dir: dir.as_ref().to_path_buf() }
    }

    fn path_for(&self, repo: &RepoRef) -> PathBuf {
        self.dir.join(format!("{}.json", repo.slug()))
    }

    /// Every record for `repo`, oldest first; empty when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns an error string when the log exists but cannot be read or parsed.
    pub fn history(&self, repo: &RepoRef) -> Result<Vec<MemoryRecord>, String> {
        let path = self.path_for(repo);
        let located = |e: &dyn std::fmt::Display| format!("{}: {e}", path.display());
        match self.fs.read_optional(&path).map_err(|e| located(&e))? {
            None => Ok(Vec::new()),
            Some(text) => serde_json::from_str(&text).map_err(|e| located(&e)),
        }
    }

    /// Appends `record` to the log for `repo`.
    ///
    /// # Errors
    ///
    /// Returns an error string when the log cannot be read back or written.
    pub fn append(&self, repo: &RepoRef, record: MemoryRecord) -> Result<(), String> {
        let mut records = self.history(repo)?;
        records.push(record);
        let json = serde_json::to_string_pretty(&records).map_err(|e| e.to_string())?;
        let path = self.path_for(repo);
        self.fs.write(&path, &json).map_err(|e| format!("{}: {e}", path.display()))
    }

    /// Builds a record stamped with the current time.
    #[must_use]
    pub fn record(&self, outcome: Outcome) -> MemoryRecord {
        MemoryRecord {
            timestamp: self.clock.now(),
            tech_stack: None,
            outcome,
            error_kind: None,
            decisions: Vec::new(),
        }
    }

    /// Renders the tail of the log for a prompt; empty when there is no history.
    #[must_use]
    pub fn context_for_prompt(&self, repo: &RepoRef) -> String {
        let records = match self.history(repo) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable memory log");
                return String::new();
            }
        };
        if records.is_empty() {
            return String::new();
        }

        let failures = records.iter().filter(|r| r.outcome == Outcome::Failure).count();
        let successes = records.iter().filter(|r| r.outcome == Outcome::Success).count();
        let mut out = String::from("PREVIOUS ATTEMPTS ON THIS REPOSITORY (oldest first):\n");
        let skip = records.len().saturating_sub(PROMPT_RECORDS);
        for record in &records[skip..] {
            let when = record.timestamp.format("%Y-%m-%d %H:%M");
            let _ = write!(out, "- {when} {:?}", record.outcome);
            if let Some(kind) = record.error_kind {
                let _ = write!(out, " [{kind}]");
            }
            if let Some(stack) = &record.tech_stack {
                let _ = write!(out, " stack: {stack}");
            }
            if !record.decisions.is_empty() {
                let _ = write!(out, " decisions: {}", record.decisions.join("; "));
            }
            out.push('\n');
        }
        let _ = writeln!(
            out,
            "{} recorded attempts, {successes} succeeded, {failures} failed. \
             Do not repeat the failures above.",
            records.len()
        );
        truncate_chars(&out, PROMPT_CHARS).to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::adapters::live::{LiveClock, LiveFileSystem};
    use crate::adapters::scripted::FixedClock;

    fn repo() -> RepoRef {
        RepoRef { owner: "acme".into(), name: "legacy".into() }
    }

    #[test]
    fn history_is_empty_without_a_log() {
        let dir = tempfile::tempdir().unwrap();
        let memory = AttemptMemory::new(&LiveFileSystem, &LiveClock, dir.path());
        assert!(memory.history(&repo()).unwrap().is_empty());
        assert_eq!(memory.context_for_prompt(&repo()), "");
    }

    #[test]
    fn append_keeps_order_and_renders_tail() {
        let dir = tempfile::tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let clock = FixedClock(at);
        let memory = AttemptMemory::new(&LiveFileSystem, &clock, dir.path());

        for i in 0..7 {
            let mut record = memory.record(Outcome::Failure);
            record.error_kind = Some(ErrorKind::BackendCrash);
            record.decisions.push(format!("attempt {i}"));
            memory.append(&repo(), record).unwrap();
        }

        let history = memory.history(&repo()).unwrap();
        assert_eq!(history.len(), 7);
        assert_eq!(history[0].decisions, vec!["attempt 0".to_string()]);

        let context = memory.context_for_prompt(&repo());
        assert!(!context.contains("attempt 1"));
        assert!(context.contains("attempt 2"));
        assert!(context.contains("[BACKEND_CRASH]"));
        assert!(context.contains("7 recorded attempts, 0 succeeded, 7 failed"));
        assert!(dir.path().join("acme__legacy.json").exists());
    }

    #[test]
    fn context_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let memory = AttemptMemory::new(&LiveFileSystem, &LiveClock, dir.path());
        let mut record = memory.record(Outcome::Started);
        record.tech_stack = Some("x".repeat(5000));
        memory.append(&repo(), record).unwrap();
        assert_eq!(memory.context_for_prompt(&repo()).chars().count(), PROMPT_CHARS);
    }
}
