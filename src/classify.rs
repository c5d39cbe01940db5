//! Execution-log classification and retry-prompt context.
//!
//! [`classify`] walks an ordered rule table, most specific first, and
//! reports the first match together with a window of surrounding log text.
//! [`build_retry_context`] renders accumulated failures plus a static
//! catalogue of known fixes for the next generation prompt.

use std::fmt::{self, Write as _};
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::model::AttemptError;

/// Characters of log kept before a match.
const CONTEXT_BEFORE: usize = 200;
/// Characters of log kept after a match.
const CONTEXT_AFTER: usize = 500;
/// Characters of each error message rendered into retry context.
const MESSAGE_LIMIT: usize = 1000;

/// Classification tag for a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum ErrorKind {
    // Module and dependency resolution
    NodeModuleNotFound,
    NodeInternalError,
    ModuleNotFound,
    PythonImportError,
    NpmError,
    // Server crash and startup
    NodeCrash,
    NodeServerCrash,
    NodePortInUse,
    BackendCrash,
    BackendStartupFailed,
    // Build and transpile
    FrontendBuildError,
    TypescriptError,
    // Sandbox and command
    SandboxError,
    SandboxUnavailable,
    CommandFailed,
    BashSyntaxError,
    MkdirError,
    PermissionError,
    FileNotFound,
    NodeFileNotFound,
    // Language runtime
    NodeReferenceError,
    NodeSyntaxError,
    SyntaxError,
    PythonSyntaxError,
    PythonNameError,
    PythonTypeError,
    PythonFileNotFound,
    // Network
    ConnectionError,
    BackendError,
    // Database
    DatabaseConnectionError,
    DatabaseError,
    MongodbConnectionError,
    // Generation pipeline
    GenerationError,
    EmptyGeneration,
    GenerationBackendDown,
    ConfigurationError,
    Exception,
}

impl ErrorKind {
    /// Wire name, e.g. `BACKEND_CRASH`.
    #[must_use]
    pub fn wire_name(self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(ToString::to_string))
            .unwrap_or_else(|| format!("{self:?}"))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_name())
    }
}

/// Ordered rule table. Earlier rules win.
const RULES: &[(&str, ErrorKind)] = &[
    (r"Cannot find module", ErrorKind::NodeModuleNotFound),
    (r"Error: Cannot find module", ErrorKind::NodeModuleNotFound),
    (r"MODULE_NOT_FOUND", ErrorKind::NodeModuleNotFound),
    (r"node:internal/modules", ErrorKind::NodeInternalError),
    (r"throw err;", ErrorKind::NodeCrash),
    (r"ReferenceError:", ErrorKind::NodeReferenceError),
    (r"Error: listen EADDRINUSE", ErrorKind::NodePortInUse),
    (r"ENOENT: no such file", ErrorKind::NodeFileNotFound),
    (r"SyntaxError: Unexpected", ErrorKind::NodeSyntaxError),
    (r"Error: ENOENT", ErrorKind::NodeFileNotFound),
    (r"BACKEND_CRASH:", ErrorKind::BackendCrash),
    (r"FATAL: Node\.js Backend failed", ErrorKind::NodeServerCrash),
    (r"FATAL: Backend failed", ErrorKind::BackendCrash),
    (r"Backend failed to start", ErrorKind::BackendStartupFailed),
    (r"Sandbox unavailable", ErrorKind::SandboxUnavailable),
    (r"No such file or directory", ErrorKind::FileNotFound),
    (r"can't open file", ErrorKind::FileNotFound),
    (r"FRONTEND BUILD FAILED", ErrorKind::FrontendBuildError),
    (r"npm ERR!", ErrorKind::NpmError),
    (r"error TS\d+:", ErrorKind::TypescriptError),
    (r"SyntaxError:", ErrorKind::SyntaxError),
    (r"Module not found", ErrorKind::ModuleNotFound),
    (r"Sandbox Error:", ErrorKind::SandboxError),
    (r"Command exited with code [^0]", ErrorKind::CommandFailed),
    (r"syntax error near unexpected token", ErrorKind::BashSyntaxError),
    (r"mkdir.*failed", ErrorKind::MkdirError),
    (r"Permission denied", ErrorKind::PermissionError),
    (r"ModuleNotFoundError:", ErrorKind::PythonImportError),
    (r"ImportError:", ErrorKind::PythonImportError),
    (r"IndentationError:", ErrorKind::PythonSyntaxError),
    (r"NameError:", ErrorKind::PythonNameError),
    (r"TypeError:", ErrorKind::PythonTypeError),
    (r"FileNotFoundError:", ErrorKind::PythonFileNotFound),
    (r"ECONNREFUSED", ErrorKind::ConnectionError),
    (r"Failed to connect", ErrorKind::ConnectionError),
    (r"Backend connection failed", ErrorKind::BackendError),
    (r"GENERATION FAILED", ErrorKind::GenerationError),
    (r"No files were generated", ErrorKind::EmptyGeneration),
    (r"MongoNetworkError", ErrorKind::DatabaseConnectionError),
    (r"MongoServerError", ErrorKind::DatabaseError),
    (r"ECONNREFUSED.*27017", ErrorKind::MongodbConnectionError),
];

fn compiled_rules() -> &'static [(Regex, ErrorKind)] {
    static COMPILED: OnceLock<Vec<(Regex, ErrorKind)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|(pattern, kind)| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .ok()
                    .map(|re| (re, *kind))
            })
            .collect()
    })
}

/// A classified log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    /// Matched error kind.
    pub kind: ErrorKind,
    /// Log text surrounding the match.
    pub context: String,
}

/// Classifies execution log text; `None` when no rule matches.
#[must_use]
pub fn classify(log: &str) -> Option<Diagnosis> {
    compiled_rules().iter().find_map(|(pattern, kind)| {
        pattern.find(log).map(|m| Diagnosis {
            kind: *kind,
            context: window(log, m.start(), m.end()),
        })
    })
}

/// Slice from `CONTEXT_BEFORE` chars before `start` to `CONTEXT_AFTER` chars after `end`.
fn window(text: &str, start: usize, end: usize) -> String {
    let from = text[..start]
        .char_indices()
        .rev()
        .nth(CONTEXT_BEFORE - 1)
        .map_or(0, |(idx, _)| idx);
    let to = text[end..]
        .char_indices()
        .nth(CONTEXT_AFTER)
        .map_or(text.len(), |(idx, _)| end + idx);
    text[from..to].to_string()
}

/// First `limit` characters of `text`.
#[must_use]
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    text.char_indices().nth(limit).map_or(text, |(idx, _)| &text[..idx])
}

const KNOWN_FIXES: &str = "\
COMMON FIXES BY ERROR FAMILY:

1. Backend startup and port binding
   - The backend MUST listen on 0.0.0.0:8000.
   - FastAPI: `uvicorn.run(app, host=\"0.0.0.0\", port=8000)` under `if __name__ == \"__main__\":`.
   - Flask: `app.run(host=\"0.0.0.0\", port=8000)`.
   - Express: `app.listen(process.env.PORT || 8000, \"0.0.0.0\")`.

2. Client and server separation
   - \"document is not defined\" or \"window is not defined\" means browser code ran on the server.
   - Keep DOM code in frontend files only; server files must never touch `document` or `window`.

3. Module and import resolution
   - Every imported package must be declared in requirements.txt or package.json.
   - Relative imports must point at files that exist in the generated set.
   - Python packages need importable module paths; avoid importing sibling folders by name.

4. Syntax and typing
   - Close every bracket, string and block; do not truncate files.
   - TypeScript: give every prop and state value an explicit type; avoid implicit any.

5. Paths and file names
   - No parentheses, brackets, spaces or shell metacharacters in file paths.
   - Next.js config must be next.config.mjs.

6. Cross-origin access
   - FastAPI: add CORSMiddleware with allow_origins=[\"*\"].
   - Express: `app.use(require(\"cors\")())`.

7. Architecture reminders
   - Preserve database models, API routes and business logic exactly.
   - Return a complete, runnable file set: entrypoint, dependency manifest, and every imported module.
";

/// Renders accumulated attempt failures and the known-fix catalogue for re-prompting.
#[must_use]
pub fn build_retry_context(errors: &[AttemptError]) -> String {
    let rule = "=".repeat(80);
    let mut out =
        format!("\n\n{rule}\nAUTOMATIC ERROR RECOVERY - FIX THE FOLLOWING ISSUES\n{rule}\n\n");
    let _ = write!(
        out,
        "The previous {} attempt(s) failed. \
         Regenerate the code so that none of these errors recur.\n\n",
        errors.len()
    );
    for (idx, error) in errors.iter().enumerate() {
        let _ = write!(
            out,
            "### Error {} (Attempt {}) - Type: {}\n```\n{}\n```\n\n",
            idx + 1,
            error.attempt,
            error.kind,
            truncate_chars(&error.message, MESSAGE_LIMIT)
        );
    }
    out.push_str(KNOWN_FIXES);
    let _ = write!(out, "\n{rule}\n");
    out
}
