//! Splits a file set into generation-sized batches.
//!
//! Grouping comes from `BATCH n - Name:` sections of the plan text when it
//! has any, otherwise from the directory layout. Either way every input file
//! lands in exactly one batch, and no batch exceeds the character budget
//! unless it holds a single file that is larger than the budget by itself.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::model::{basename, extension, Batch, FileRecord};

/// Name of the batch that collects files the plan did not mention.
pub const REMAINING_BATCH: &str = "Remaining Files";
/// Name of the directory-fallback batch holding configuration files.
pub const CONFIG_BATCH: &str = "Config & Dependencies";
/// Name of the directory-fallback batch for files at the repository root.
pub const ROOT_BATCH: &str = "Root Files";

const CONFIG_EXTENSIONS: &[&str] =
    &[".json", ".yml", ".yaml", ".toml", ".cfg", ".ini", ".env", ".lock"];

const CONFIG_NAMES: &[&str] = &[
    "package.json",
    "requirements.txt",
    "tsconfig.json",
    ".gitignore",
    "Dockerfile",
    "docker-compose.yml",
    ".env",
    ".env.example",
    "next.config.mjs",
    "next.config.ts",
    "tailwind.config.ts",
    "postcss.config.mjs",
    "eslint.config.mjs",
    "vite.config.ts",
];

/// Partitions `files` into batches guided by `plan_text`, each at most
/// `max_chars` characters long.
#[must_use]
pub fn plan_batches(files: &[FileRecord], plan_text: &str, max_chars: usize) -> Vec<Batch> {
    let batches = match batches_from_plan(files, plan_text) {
        Some(batches) => batches,
        None => group_by_directory(files),
    };
    split_oversized(batches, max_chars)
}

fn header_pattern() -> Option<&'static Regex> {
    static HEADER: OnceLock<Option<Regex>> = OnceLock::new();
    HEADER
        .get_or_init(|| {
            Regex::new(r"(?i)^(?:#+\s*)?(?:\*\*)?BATCH\s+\d+\s*[-:]\s*(.+?)(?:\*\*)?:?\s*$").ok()
        })
        .as_ref()
}

/// Reads `BATCH n - Name:` sections; `None` when the text declares none or
/// none of its entries name a scanned file.
fn batches_from_plan(files: &[FileRecord], plan_text: &str) -> Option<Vec<Batch>> {
    let header = header_pattern()?;
    let mut sections: Vec<(String, Vec<String>)> = Vec::new();

    for line in plan_text.lines() {
        let line = line.trim();
        if let Some(caps) = header.captures(line) {
            let name = caps[1].trim().trim_end_matches(':').trim().to_string();
            sections.push((name, Vec::new()));
        } else if let Some(entry) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            if let Some((_, paths)) = sections.last_mut() {
                let path = entry.trim().trim_matches(|c| c == '`' || c == '"' || c == '\'').trim();
                if !path.is_empty() {
                    paths.push(path.to_string());
                }
            }
        }
    }
    if sections.is_empty() {
        return None;
    }

    let mut assigned: HashSet<usize> = HashSet::new();
    let mut batches = Vec::new();
    for (name, paths) in sections {
        let mut members = Vec::new();
        for path in &paths {
            if let Some(idx) = resolve(files, path, &assigned) {
                assigned.insert(idx);
                members.push(files[idx].clone());
            }
        }
        if !members.is_empty() {
            batches.push(Batch { name, files: members });
        }
    }

    if batches.is_empty() {
        tracing::debug!("plan sections matched no scanned file");
        return None;
    }

    let remaining: Vec<FileRecord> = files
        .iter()
        .enumerate()
        .filter(|(idx, _)| !assigned.contains(idx))
        .map(|(_, f)| f.clone())
        .collect();
    if !remaining.is_empty() {
        tracing::debug!(count = remaining.len(), "plan left files unassigned");
        batches.push(Batch { name: REMAINING_BATCH.to_string(), files: remaining });
    }
    Some(batches)
}

/// Finds the unassigned file a plan entry refers to: exact path, then a
/// suffix match on a path boundary in either direction, then basename.
///
/// An entry naming a file that is already assigned resolves to nothing, so a
/// repeated entry never claims a different file with the same basename.
fn resolve(files: &[FileRecord], wanted: &str, assigned: &HashSet<usize>) -> Option<usize> {
    let wanted = wanted.trim_start_matches("./");
    let open = |idx: usize| !assigned.contains(&idx);

    if let Some(idx) = files.iter().position(|f| f.path == wanted) {
        return open(idx).then_some(idx);
    }
    let nested = |outer: &str, inner: &str| {
        outer.len() > inner.len()
            && outer.ends_with(inner)
            && outer.as_bytes()[outer.len() - inner.len() - 1] == b'/'
    };
    let mut suffix_matches = (0..files.len())
        .filter(|&i| nested(&files[i].path, wanted) || nested(wanted, &files[i].path))
        .peekable();
    if suffix_matches.peek().is_some() {
        return suffix_matches.find(|&i| open(i));
    }
    let wanted_base = basename(wanted);
    (0..files.len()).filter(|&i| open(i)).find(|&i| files[i].basename() == wanted_base)
}

fn is_config_file(file: &FileRecord) -> bool {
    CONFIG_NAMES.contains(&file.basename())
        || CONFIG_EXTENSIONS.contains(&extension(&file.path).as_str())
}

/// Config files first, then one batch per parent directory in path order.
fn group_by_directory(files: &[FileRecord]) -> Vec<Batch> {
    let mut config = Vec::new();
    let mut by_dir: BTreeMap<String, Vec<FileRecord>> = BTreeMap::new();
    for file in files {
        if is_config_file(file) {
            config.push(file.clone());
        } else {
            let dir = file.path.rsplit_once('/').map_or("", |(dir, _)| dir).to_string();
            by_dir.entry(dir).or_default().push(file.clone());
        }
    }

    let mut batches = Vec::new();
    if !config.is_empty() {
        batches.push(Batch { name: CONFIG_BATCH.to_string(), files: config });
    }
    for (dir, files) in by_dir {
        let name = if dir.is_empty() { ROOT_BATCH.to_string() } else { dir.replace('/', " > ") };
        batches.push(Batch { name, files });
    }
    batches
}

/// Splits every batch above `max_chars` into consecutive `(Part N)` pieces.
fn split_oversized(batches: Vec<Batch>, max_chars: usize) -> Vec<Batch> {
    let mut out = Vec::new();
    for batch in batches {
        if batch.char_len() <= max_chars {
            out.push(batch);
            continue;
        }

        let mut parts: Vec<Vec<FileRecord>> = Vec::new();
        let mut current: Vec<FileRecord> = Vec::new();
        let mut current_len = 0;
        for file in batch.files {
            let len = file.char_len();
            if len > max_chars {
                tracing::warn!(
                    path = %file.path,
                    chars = len,
                    budget = max_chars,
                    "file exceeds batch budget on its own"
                );
            }
            if !current.is_empty() && current_len + len > max_chars {
                parts.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current_len += len;
            current.push(file);
        }
        if !current.is_empty() {
            parts.push(current);
        }

        if parts.len() == 1 {
            out.push(Batch { name: batch.name, files: parts.remove(0) });
        } else {
            for (idx, files) in parts.into_iter().enumerate() {
                out.push(Batch { name: format!("{} (Part {})", batch.name, idx + 1), files });
            }
        }
    }
    out
}
