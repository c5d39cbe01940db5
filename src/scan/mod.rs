//! Repository scanning: path listing and the deep scan that fetches file
//! contents and profiles the stack.

pub mod profile;

use tracing::{debug, info, warn};

use crate::config::Timings;
use crate::model::{basename, extension, FileRecord, ScanSnapshot};
use crate::ports::repository::{RepoRef, RepoTree, RepositoryReader, TreeEntry, TreeEntryKind};

pub use profile::{build_profile, preservation_summary};

/// Blobs above this size are never fetched.
pub const MAX_FILE_BYTES: u64 = 500_000;
/// Fetched files between rate-limit pauses.
pub const FETCH_PAUSE_EVERY: usize = 30;

const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "venv",
    ".venv",
    "__pycache__",
    ".git",
    "dist",
    "build",
    ".next",
    ".nuxt",
    "coverage",
    ".cache",
    "vendor",
    "bower_components",
    ".tox",
    ".eggs",
];

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "bmp", "webp", "mp3", "mp4", "wav", "avi", "mkv", "mov",
    "zip", "tar", "gz", "rar", "7z", "pdf", "doc", "docx", "xls", "xlsx", "woff", "woff2", "ttf",
    "eot", "otf", "pyc", "pyo", "so", "dll", "exe", "o", "ds_store", "map",
];

const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "tsx", "jsx", "mjs", "cjs", "rb", "go", "rs", "java", "php", "c", "cpp", "h",
    "cs", "swift", "kt", "dart", "lua", "r", "pl", "sh", "bat", "ps1", "html", "htm", "css", "scss",
    "sass", "less", "styl", "vue", "svelte", "ejs", "pug", "hbs", "handlebars", "mustache", "astro",
    "mdx", "json", "yaml", "yml", "toml", "cfg", "ini", "xml", "env", "example", "local",
    "development", "production", "conf", "properties", "editorconfig", "sql", "prisma", "graphql",
    "gql", "proto", "md", "txt", "rst", "csv", "lock", "npmrc", "nvmrc", "babelrc", "dockerfile",
    "svg",
];

const IMPORTANT_FILES: &[&str] = &[
    "package.json",
    "requirements.txt",
    "Pipfile",
    "pyproject.toml",
    "setup.py",
    "setup.cfg",
    "docker-compose.yml",
    "docker-compose.yaml",
    "Dockerfile",
    ".env",
    ".env.example",
    "schema.prisma",
    "Makefile",
    "Procfile",
    "Gemfile",
    ".gitignore",
    ".dockerignore",
];

const PATH_HINTS: &[&str] = &["model", "schema", "route", "api", "controller"];

const LANGUAGES: &[(&str, &str)] = &[
    ("py", "python"),
    ("js", "javascript"),
    ("mjs", "javascript"),
    ("cjs", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript-react"),
    ("jsx", "javascript-react"),
    ("json", "json"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("html", "html"),
    ("htm", "html"),
    ("css", "css"),
    ("scss", "scss"),
    ("sass", "sass"),
    ("less", "less"),
    ("sql", "sql"),
    ("md", "markdown"),
    ("mdx", "mdx"),
    ("xml", "xml"),
    ("svg", "svg"),
    ("vue", "vue"),
    ("svelte", "svelte"),
    ("ejs", "ejs"),
    ("pug", "pug"),
    ("hbs", "handlebars"),
    ("rb", "ruby"),
    ("go", "go"),
    ("rs", "rust"),
    ("java", "java"),
    ("php", "php"),
    ("c", "c"),
    ("cpp", "cpp"),
    ("cs", "csharp"),
    ("swift", "swift"),
    ("kt", "kotlin"),
    ("dart", "dart"),
    ("lua", "lua"),
    ("sh", "bash"),
    ("bat", "batch"),
    ("ps1", "powershell"),
    ("toml", "toml"),
    ("ini", "ini"),
    ("cfg", "ini"),
    ("prisma", "prisma"),
    ("graphql", "graphql"),
    ("gql", "graphql"),
    ("proto", "protobuf"),
    ("dockerfile", "dockerfile"),
    ("astro", "astro"),
    ("r", "r"),
];

/// Whether a tree entry is worth fetching.
#[must_use]
pub fn should_fetch(entry: &TreeEntry) -> bool {
    if entry.kind != TreeEntryKind::Blob || entry.size > MAX_FILE_BYTES {
        return false;
    }
    let path = entry.path.replace('\\', "/");
    if path.split('/').any(|part| SKIP_DIRS.contains(&part) || part.ends_with(".egg-info")) {
        return false;
    }
    let ext = extension(&path);
    let ext = ext.trim_start_matches('.');
    if BINARY_EXTENSIONS.contains(&ext) {
        return false;
    }
    let lower = path.to_lowercase();
    CODE_EXTENSIONS.contains(&ext)
        || IMPORTANT_FILES.contains(&basename(&path))
        || PATH_HINTS.iter().any(|hint| lower.contains(hint))
}

/// Language label for a path.
#[must_use]
pub fn detect_language(path: &str) -> &'static str {
    match basename(path) {
        "Dockerfile" => return "dockerfile",
        "Makefile" => return "makefile",
        "Gemfile" => return "ruby",
        "Procfile" => return "yaml",
        _ => {}
    }
    let ext = extension(path);
    let ext = ext.trim_start_matches('.');
    LANGUAGES.iter().find(|(e, _)| *e == ext).map_or("text", |(_, lang)| lang)
}

/// Lists blob paths, trying `main`, then `master`, then the reported default branch.
///
/// # Errors
///
/// Returns an error string when no branch could be listed.
pub async fn list_paths(
    reader: &dyn RepositoryReader,
    repo: &RepoRef,
) -> Result<Vec<String>, String> {
    let mut last_error = String::new();
    for branch in ["main", "master"] {
        match reader.tree(repo, branch).await {
            Ok(tree) => return Ok(blob_paths(&tree, branch)),
            Err(e) => {
                debug!(%repo, branch, error = %e, "branch listing failed");
                last_error = e.to_string();
            }
        }
    }
    let branch = reader.default_branch(repo).await.map_err(|e| {
        format!("Could not find repository or branch: {e} (last listing error: {last_error})")
    })?;
    let tree = reader
        .tree(repo, &branch)
        .await
        .map_err(|e| format!("Could not list branch '{branch}': {e}"))?;
    Ok(blob_paths(&tree, &branch))
}

fn blob_paths(tree: &RepoTree, branch: &str) -> Vec<String> {
    if tree.truncated {
        warn!(branch, "repository tree was truncated by the host");
    }
    let paths: Vec<String> = tree
        .entries
        .iter()
        .filter(|e| e.kind == TreeEntryKind::Blob)
        .map(|e| e.path.clone())
        .collect();
    info!(files = paths.len(), branch, "scan listed files");
    paths
}

/// Fetches every relevant file on the default branch and profiles the stack.
///
/// Files that cannot be fetched are skipped. A pause of
/// `timings.fetch_pause` follows every [`FETCH_PAUSE_EVERY`] fetched files.
///
/// # Errors
///
/// Returns an error string when the default branch or its tree cannot be read.
pub async fn deep_scan(
    reader: &dyn RepositoryReader,
    repo: &RepoRef,
    timings: &Timings,
) -> Result<ScanSnapshot, String> {
    let branch = reader
        .default_branch(repo)
        .await
        .map_err(|e| format!("Failed to read repository {repo}: {e}"))?;
    let tree = reader
        .tree(repo, &branch)
        .await
        .map_err(|e| format!("Failed to get repository tree for {repo}@{branch}: {e}"))?;
    if tree.truncated {
        warn!(%repo, "tree was truncated by the host; some files may be missing");
    }

    let blobs = tree.entries.iter().filter(|e| e.kind == TreeEntryKind::Blob).count();
    let mut files = Vec::new();
    for entry in tree.entries.iter().filter(|e| should_fetch(e)) {
        match reader.fetch_file(repo, &branch, entry).await {
            Ok(Some(content)) => {
                let mut record = FileRecord::new(&entry.path, content);
                record.language = Some(detect_language(&entry.path).to_string());
                debug!(path = %entry.path, fetched = files.len() + 1, "fetched file");
                files.push(record);
                if files.len() % FETCH_PAUSE_EVERY == 0 {
                    tokio::time::sleep(timings.fetch_pause).await;
                }
            }
            Ok(None) => debug!(path = %entry.path, "file not found, skipping"),
            Err(e) => warn!(path = %entry.path, error = %e, "failed to fetch file, skipping"),
        }
    }

    if files.is_empty() {
        warn!(%repo, blobs, "no files were fetched");
    } else if files.len() * 10 < blobs * 3 {
        warn!(%repo, fetched = files.len(), blobs, "low fetch rate");
    }
    info!(%repo, fetched = files.len(), blobs, "deep scan complete");

    let profile = build_profile(&files);
    let preservation_summary = preservation_summary(&profile, files.len());
    Ok(ScanSnapshot { files, profile, preservation_summary })
}
