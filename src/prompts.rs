//! Prompt text for planning, generation, and analysis.

use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Batch, FileRecord, ScanSnapshot, TechStackProfile};
use crate::ports::repository::RepoRef;

/// Signature lines kept per file in a batch summary.
const SIGNATURES_PER_FILE: usize = 12;
/// Characters kept per signature line.
const SIGNATURE_CHARS: usize = 160;

const DEFAULT_INSTRUCTIONS: &str = "Modernize the UI while preserving all functionality";

/// Output contract shared by every generation prompt.
pub const OUTPUT_RULES: &str = "\
OUTPUT FORMAT
Output every file in exactly this form:

<file path=\"EXACT/ORIGINAL/PATH\">
COMPLETE FILE CONTENT
</file>

Rules:
- Use the exact original file path.
- Include the complete file content. No placeholders such as \"... rest of code ...\".
- Do not wrap file content in markdown code fences.
- Keep every function, route, and database query of the original.
- Python servers listen on 0.0.0.0:8000; Node servers read process.env.PORT and default to 3000.
- Server code and browser code live in separate files. Never reference document or window in server files.
- File paths contain only letters, digits, '-', '_', '.', and '/'.
";

const PRESERVATION_RULES: &str = "\
You are not creating a new application. You are enhancing an existing one.
Copy every file, function, endpoint, and line of business logic.
Change only styling, formatting, and safe performance improvements that keep outputs identical.
Keep the same database, framework, port numbers, and middleware.
";

fn instructions_or_default(instructions: &str) -> &str {
    if instructions.trim().is_empty() {
        DEFAULT_INSTRUCTIONS
    } else {
        instructions
    }
}

fn numbered(out: &mut String, items: &[String], empty: &str) {
    if items.is_empty() {
        let _ = writeln!(out, "  {empty}");
    }
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "  {}. {item}", i + 1);
    }
}

fn stack_lines(out: &mut String, profile: &TechStackProfile) {
    let show = |v: &Option<String>| v.as_deref().unwrap_or("unknown").to_string();
    let _ = writeln!(out, "- Backend framework: {}", show(&profile.backend.framework));
    let _ = writeln!(out, "- Database: {}", show(&profile.backend.database));
    let _ = writeln!(out, "- Auth: {}", show(&profile.backend.auth));
    let _ = writeln!(out, "- Frontend framework: {}", show(&profile.frontend.framework));
    let _ = writeln!(out, "- Styling: {}", show(&profile.frontend.styling));
}

fn file_block(out: &mut String, index: usize, file: &FileRecord) {
    let _ = write!(
        out,
        "\n=== ORIGINAL FILE #{index}: {} ===\n```{}\n{}\n```\n",
        file.path,
        file.language.as_deref().unwrap_or(""),
        file.content
    );
}

/// Planning prompt: paths and metadata only, no file contents.
#[must_use]
pub fn plan_prompt(repo: &RepoRef, instructions: &str, snapshot: &ScanSnapshot) -> String {
    let profile = &snapshot.profile;
    let mut out = format!(
        "Create a preservation-first modernization plan for the repository {repo}.\n\
         User instructions: {}\n\nDETECTED STACK\n",
        instructions_or_default(instructions)
    );
    stack_lines(&mut out, profile);
    let _ = writeln!(out, "\nFILES ({})", snapshot.files.len());
    numbered(&mut out, &snapshot.paths(), "(none)");
    out.push_str("\nAPI ENDPOINTS\n");
    numbered(&mut out, &profile.api_endpoints, "(none detected)");
    out.push_str("\nMUST PRESERVE\n");
    numbered(&mut out, &profile.must_preserve, "(nothing flagged)");
    out.push_str("\nCAN MODERNIZE\n");
    numbered(&mut out, &profile.can_modernize, "(nothing flagged)");
    out.push_str(
        "\nWrite a short strategy, then group EVERY file above into batches of related files, \
         using exactly this format:\n\nBATCH 1 - Name:\n- path/one\n- path/two\n\n\
         BATCH 2 - Name:\n- path/three\n\nEvery listed file must appear in exactly one batch.\n",
    );
    out
}

/// Single-call generation prompt carrying every original file.
#[must_use]
pub fn generation_prompt(plan: &str, snapshot: &ScanSnapshot, memory_context: &str) -> String {
    let total = snapshot.files.len();
    let mut out = String::new();
    if !memory_context.is_empty() {
        let _ = writeln!(out, "{memory_context}");
    }
    out.push_str(PRESERVATION_RULES);
    let _ = writeln!(
        out,
        "The original repository has {total} files. Your output must contain all {total}.\n"
    );
    let _ = writeln!(out, "MODERNIZATION PLAN\n{plan}\n");
    out.push_str("FILES YOU MUST OUTPUT\n");
    numbered(&mut out, &snapshot.paths(), "(none)");
    out.push_str("\nAPI ENDPOINTS YOU MUST PRESERVE\n");
    let endpoints = &snapshot.profile.api_endpoints;
    numbered(&mut out, endpoints, "(detect from server files and preserve all)");
    let _ = writeln!(
        out,
        "\nDATABASE: {} (keep it and copy the connection code exactly)",
        snapshot.profile.backend.database.as_deref().unwrap_or("unknown")
    );
    for (i, file) in snapshot.files.iter().enumerate() {
        file_block(&mut out, i + 1, file);
    }
    out.push('\n');
    out.push_str(OUTPUT_RULES);
    let _ = write!(out, "\nNow output all {total} enhanced files.\n");
    out
}

/// Prompt for one batch of a multi-batch generation.
#[derive(Debug, Clone, Copy)]
pub struct BatchPrompt<'a> {
    /// Plan text, possibly with retry context appended.
    pub plan: &'a str,
    /// The batch to generate.
    pub batch: &'a Batch,
    /// Zero-based position of the batch.
    pub index: usize,
    /// Number of batches in the run.
    pub total: usize,
    /// Every path in the repository, for cross-references.
    pub all_paths: &'a [String],
    /// Signatures from batches already generated.
    pub summaries: &'a str,
    /// Memory context; only the first batch carries it.
    pub memory_context: &'a str,
}

impl BatchPrompt<'_> {
    /// Renders the prompt.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.memory_context.is_empty() {
            let _ = writeln!(out, "{}", self.memory_context);
        }
        let _ = writeln!(
            out,
            "BATCH {} OF {}: {} ({} files)\n",
            self.index + 1,
            self.total,
            self.batch.name,
            self.batch.files.len()
        );
        out.push_str(PRESERVATION_RULES);
        let _ = writeln!(out, "\nMODERNIZATION PLAN\n{}\n", self.plan);
        out.push_str("ALL FILES IN THE REPOSITORY (for imports and references only)\n");
        for path in self.all_paths {
            let _ = writeln!(out, "  - {path}");
        }
        if !self.summaries.is_empty() {
            let _ = writeln!(
                out,
                "\nALREADY GENERATED (stay consistent with these exports and routes){}",
                self.summaries
            );
        }
        out.push_str("\nFILES IN THIS BATCH (output exactly these)\n");
        for (i, file) in self.batch.files.iter().enumerate() {
            file_block(&mut out, i + 1, file);
        }
        out.push('\n');
        out.push_str(OUTPUT_RULES);
        let _ = write!(out, "\nNow output the {} files of this batch.\n", self.batch.files.len());
        out
    }
}

/// Prompt asking the planner for a modernization recommendation.
#[must_use]
pub fn analysis_prompt(repo: &RepoRef, snapshot: &ScanSnapshot) -> String {
    let mut out = format!("Analyze the repository {repo} for modernization.\n\nDETECTED STACK\n");
    stack_lines(&mut out, &snapshot.profile);
    let _ = writeln!(out, "\nSUMMARY: {}", snapshot.preservation_summary);
    out.push_str("\nFILES\n");
    numbered(&mut out, &snapshot.paths(), "(none)");
    out.push_str("\nAPI ENDPOINTS\n");
    numbered(&mut out, &snapshot.profile.api_endpoints, "(none detected)");
    out.push_str(
        "\nIn under 200 words recommend a modern target stack, what must be preserved, \
         and the main risks of the migration. Plain text, no code.\n",
    );
    out
}

fn signature_pattern() -> Option<&'static Regex> {
    static SIGNATURE: OnceLock<Option<Regex>> = OnceLock::new();
    SIGNATURE
        .get_or_init(|| {
            Regex::new(
                r"^\s*(?:export\s+|module\.exports|exports\.|def\s+|async\s+def\s+|class\s+|(?:async\s+)?function\s+|@(?:app|router)\.|(?:app|router)\.(?:get|post|put|delete|patch|use)\s*\()",
            )
            .ok()
        })
        .as_ref()
}

/// Key declarations (exports, functions, classes, routes) of generated files.
#[must_use]
pub fn batch_summary(files: &[FileRecord]) -> String {
    let mut out = String::new();
    for file in files {
        let _ = writeln!(out, "{}:", file.path);
        let Some(pattern) = signature_pattern() else {
            continue;
        };
        for line in file.content.lines().filter(|l| pattern.is_match(l)).take(SIGNATURES_PER_FILE) {
            let line: String = line.trim().chars().take(SIGNATURE_CHARS).collect();
            let _ = writeln!(out, "  {line}");
        }
    }
    out
}
