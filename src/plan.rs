//! Modernization planning with a synthetic fallback when the planner is down.

use std::fmt::Write as _;

use tracing::{info, warn};

use crate::generation::{GenerationClient, GenerationError};
use crate::model::ScanSnapshot;
use crate::prompts;
use crate::ports::repository::RepoRef;

const DEFAULT_FALLBACK_INSTRUCTIONS: &str =
    "Modernize the UI while preserving ALL backend logic, database schemas, and API endpoints.";

/// A plan and whether it was synthesized locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOutcome {
    /// Plan text, including `BATCH n - Name:` groupings.
    pub text: String,
    /// Set when the planner model was unavailable.
    pub fallback: bool,
}

/// Asks the planner model for a plan, falling back to [`fallback_plan`].
///
/// # Errors
///
/// Returns [`GenerationError::Configuration`] when the backend is not
/// configured; every other failure produces a fallback plan.
pub async fn generate_plan(
    client: &GenerationClient<'_>,
    planner_model: &str,
    repo: &RepoRef,
    instructions: &str,
    snapshot: &ScanSnapshot,
) -> Result<PlanOutcome, GenerationError> {
    let prompt = prompts::plan_prompt(repo, instructions, snapshot);
    info!(
        files = snapshot.files.len(),
        prompt_chars = prompt.len(),
        "requesting modernization plan"
    );
    match client.generate(&prompt, planner_model).await {
        Ok(text) => Ok(PlanOutcome { text, fallback: false }),
        Err(error @ GenerationError::Configuration(_)) => Err(error),
        Err(error) => {
            warn!(%error, "planner unavailable, building fallback plan");
            Ok(PlanOutcome { text: fallback_plan(repo, instructions, snapshot), fallback: true })
        }
    }
}

/// Plan built from the scan alone: stack, files, one batch per top-level directory.
#[must_use]
pub fn fallback_plan(repo: &RepoRef, instructions: &str, snapshot: &ScanSnapshot) -> String {
    let profile = &snapshot.profile;
    let instructions =
        if instructions.trim().is_empty() { DEFAULT_FALLBACK_INSTRUCTIONS } else { instructions };

    let mut groups: Vec<(String, Vec<&str>)> = Vec::new();
    for file in &snapshot.files {
        let path = file.path.as_str();
        let group = match path.split_once('/') {
            Some((top, _)) => top.to_string(),
            None => "root".to_string(),
        };
        match groups.iter_mut().find(|(name, _)| *name == group) {
            Some((_, paths)) => paths.push(path),
            None => groups.push((group, vec![path])),
        }
    }

    let mut out = format!(
        "# Fallback Modernization Plan for {repo}\n\
         (Generated from the repository scan; the planner model was unavailable.)\n\n\
         ## Instructions\n{instructions}\n\n## Detected Tech Stack\n"
    );
    let show = |v: &Option<String>, default: &'static str| {
        v.clone().unwrap_or_else(|| default.to_string())
    };
    let _ = writeln!(out, "- Backend Framework: {}", show(&profile.backend.framework, "Unknown"));
    let _ = writeln!(out, "- Database: {}", show(&profile.backend.database, "None detected"));
    let _ = writeln!(out, "- Frontend Framework: {}", show(&profile.frontend.framework, "Unknown"));

    let _ = writeln!(out, "\n## Files ({} total)", snapshot.files.len());
    for file in &snapshot.files {
        let _ = writeln!(out, "- {}", file.path);
    }

    out.push_str("\n## Batch Groups\n");
    for (i, (group, paths)) in groups.iter().enumerate() {
        let _ = writeln!(out, "\nBATCH {} - {group}:", i + 1);
        for path in paths {
            let _ = writeln!(out, "- {path}");
        }
    }

    out.push_str(
        "\n## Modernization Strategy\n\
         1. Preserve all backend logic, API endpoints, and database schemas exactly.\n\
         2. Modernize the frontend with clean HTML/CSS/JS or React.\n\
         3. Keep the same file structure where possible.\n\
         4. Ensure all imports and dependencies are correct.\n",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted::ScriptedLlm;
    use crate::batch::plan_batches;
    use crate::config::Timings;
    use crate::model::FileRecord;
    use crate::ports::llm::LlmError;

    fn repo() -> RepoRef {
        RepoRef { owner: "acme".into(), name: "shop".into() }
    }

    fn snapshot() -> ScanSnapshot {
        ScanSnapshot {
            files: vec![
                FileRecord::new("server.js", "a"),
                FileRecord::new("public/index.html", "b"),
                FileRecord::new("public/app.css", "c"),
                FileRecord::new("models/user.js", "d"),
            ],
            ..ScanSnapshot::default()
        }
    }

    #[test]
    fn fallback_plan_groups_by_top_level_dir() {
        let plan = fallback_plan(&repo(), "", &snapshot());
        assert!(plan.contains("BATCH 1 - root:\n- server.js"));
        assert!(plan.contains("BATCH 2 - public:\n- public/index.html\n- public/app.css"));
        assert!(plan.contains("BATCH 3 - models:"));
        assert!(plan.contains(DEFAULT_FALLBACK_INSTRUCTIONS));

        let batches = plan_batches(&snapshot().files, &plan, 1_000);
        let names: Vec<&str> = batches.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["root", "public", "models"]);
    }

    #[tokio::test]
    async fn exhausted_planner_falls_back() {
        let llm = ScriptedLlm::from_fn(|_| Err(LlmError::BadRequest { message: "nope".into() }));
        let timings = Timings::immediate();
        let client = GenerationClient::new(&llm, &timings);
        let plan =
            generate_plan(&client, "gemini-2.0-flash", &repo(), "go", &snapshot()).await.unwrap();
        assert!(plan.fallback);
        assert!(plan.text.starts_with("# Fallback Modernization Plan for acme/shop"));
    }

    #[tokio::test]
    async fn missing_key_is_an_error() {
        let llm = ScriptedLlm::new(vec![Err(LlmError::MissingApiKey)]);
        let timings = Timings::immediate();
        let client = GenerationClient::new(&llm, &timings);
        let result = generate_plan(&client, "gemini-2.0-flash", &repo(), "", &snapshot()).await;
        assert!(matches!(result, Err(GenerationError::Configuration(_))));
    }

    #[tokio::test]
    async fn planner_text_is_used_verbatim() {
        let llm = ScriptedLlm::always(Ok("BATCH 1 - All:\n- server.js".into()));
        let timings = Timings::immediate();
        let client = GenerationClient::new(&llm, &timings);
        let plan =
            generate_plan(&client, "gemini-2.0-flash", &repo(), "", &snapshot()).await.unwrap();
        let expected = PlanOutcome { text: "BATCH 1 - All:\n- server.js".into(), fallback: false };
        assert_eq!(plan, expected);
    }
}
