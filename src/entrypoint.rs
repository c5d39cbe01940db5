//! Picks the process entrypoint and runtime for a generated file set.

use crate::model::{FileRecord, Runtime};

/// Entrypoint used when nothing in the file set qualifies.
pub const DEFAULT_ENTRYPOINT: &str = "modernized_stack/backend/main.py";

const PYTHON_ENTRYPOINTS: &[&str] = &["main.py", "app.py", "server.py", "run.py", "api.py"];
const NODE_ENTRYPOINTS: &[&str] = &["server.js", "index.js", "backend.js", "api.js"];
const BROWSER_MARKERS: &[&str] = &["document.", "window.", "addEventListener", "getElementById"];

fn lower(file: &FileRecord) -> String {
    file.path.to_lowercase()
}

/// Returns `true` when the script touches browser-only globals.
#[must_use]
pub fn uses_browser_apis(content: &str) -> bool {
    BROWSER_MARKERS.iter().any(|marker| content.contains(marker))
}

/// Chooses the entrypoint path and the runtime that should start it.
#[must_use]
pub fn infer(files: &[FileRecord]) -> (String, Runtime) {
    let has_py = files.iter().any(|f| f.path.ends_with(".py"));
    let has_manifest = files.iter().any(|f| f.path.ends_with("requirements.txt"));

    if has_py || has_manifest {
        let named = files.iter().find(|f| {
            let path = lower(f);
            !path.contains("frontend")
                && !path.contains("client")
                && PYTHON_ENTRYPOINTS.contains(&f.basename())
        });
        let under_backend = || {
            files.iter().find(|f| {
                let path = lower(f);
                f.path.ends_with(".py") && (path.contains("backend") || path.contains("api"))
            })
        };
        if let Some(file) = named.or_else(under_backend) {
            return (file.path.clone(), Runtime::Python);
        }
    }

    let node_server = files.iter().find(|f| {
        let path = lower(f);
        !path.contains("frontend")
            && !path.contains("client")
            && !path.contains("public")
            && (NODE_ENTRYPOINTS.contains(&f.basename()) || f.path.ends_with("server.js"))
            && !uses_browser_apis(&f.content)
    });
    if let Some(file) = node_server {
        return (file.path.clone(), Runtime::Node);
    }

    let py_files: Vec<&FileRecord> = files.iter().filter(|f| f.path.ends_with(".py")).collect();
    if let Some(first) = py_files.first() {
        let chosen = py_files.iter().find(|f| lower(f).contains("backend")).unwrap_or(first);
        return (chosen.path.clone(), Runtime::Python);
    }

    if files.iter().any(|f| f.path.ends_with("package.json")) {
        let server_js = files.iter().find(|f| {
            let path = lower(f);
            f.path.ends_with(".js")
                && (path.contains("backend") || path.contains("server"))
                && !uses_browser_apis(&f.content)
        });
        if let Some(file) = server_js {
            return (file.path.clone(), Runtime::Node);
        }
    }

    (DEFAULT_ENTRYPOINT.to_string(), Runtime::Python)
}
