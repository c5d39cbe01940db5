//! Read-only repository analysis: deep scan plus a modernization recommendation.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Settings;
use crate::context::ServiceContext;
use crate::generation::GenerationClient;
use crate::model::{ScanSnapshot, TechStackProfile};
use crate::orchestrator::{Cancelled, EventSink, RunEvent};
use crate::ports::repository::RepoRef;
use crate::prompts;
use crate::scan::deep_scan;

/// Where a recommendation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSource {
    /// Written by the planner model.
    Planner,
    /// Derived locally from the profile.
    Heuristic,
}

/// Payload of the terminal `analysis` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// `owner/name`.
    pub repo: String,
    /// Number of scanned files.
    pub file_count: usize,
    /// Detected stack and derived lists.
    pub tech_stack: TechStackProfile,
    /// One-line preservation summary.
    pub preservation_summary: String,
    /// Modernization advice.
    pub recommendation: String,
    /// Origin of `recommendation`.
    pub recommendation_source: RecommendationSource,
}

/// Failure of an analysis.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The repository could not be listed.
    #[error("scan failed: {0}")]
    Scan(String),
    /// The event consumer went away.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Recommendation built from the profile alone.
#[must_use]
pub fn heuristic_recommendation(profile: &TechStackProfile) -> String {
    let mut lines = Vec::new();
    match profile.backend.framework.as_deref() {
        Some("Flask" | "Django") => lines.push(
            "Backend: keep the Python service; consider FastAPI for typed request models and async handlers."
                .to_string(),
        ),
        Some(framework) => {
            lines.push(format!("Backend: keep {framework} and update its dependencies."));
        }
        None => lines.push(
            "Backend: no server framework detected; add a FastAPI or Express entrypoint."
                .to_string(),
        ),
    }
    match profile.frontend.framework.as_deref() {
        Some("Next.js") => lines.push(
            "Frontend: already on Next.js; refresh components and styling.".to_string(),
        ),
        Some(framework) => lines.push(format!(
            "Frontend: migrate {framework} views to Next.js with Tailwind CSS."
        )),
        None => lines.push(
            "Frontend: replace server-rendered pages with a static HTML/CSS/JS or React UI."
                .to_string(),
        ),
    }
    if let Some(database) = &profile.backend.database {
        lines.push(format!("Preserve the {database} schema and connection settings exactly."));
    }
    if !profile.api_endpoints.is_empty() {
        let count = profile.api_endpoints.len();
        lines.push(format!("Keep all {count} API endpoints and their request shapes."));
    }
    if let Some(auth) = &profile.backend.auth {
        lines.push(format!("Keep the {auth} authentication flow unchanged."));
    }
    lines.join("\n")
}

async fn recommend(
    ctx: &ServiceContext,
    settings: &Settings,
    repo: &RepoRef,
    snapshot: &ScanSnapshot,
) -> (String, RecommendationSource) {
    let client = GenerationClient::new(ctx.llm.as_ref(), &settings.timings);
    let prompt = prompts::analysis_prompt(repo, snapshot);
    match client.generate(&prompt, &settings.planner_model).await {
        Ok(text) if !text.trim().is_empty() => {
            (text.trim().to_string(), RecommendationSource::Planner)
        }
        Ok(_) => (heuristic_recommendation(&snapshot.profile), RecommendationSource::Heuristic),
        Err(error) => {
            warn!(%error, "planner unavailable, using heuristic recommendation");
            (heuristic_recommendation(&snapshot.profile), RecommendationSource::Heuristic)
        }
    }
}

/// Scans `repo` and streams `log`, `files` and a terminal `analysis` event.
///
/// # Errors
///
/// Returns [`AnalysisError::Scan`] when the repository cannot be read, and
/// [`AnalysisError::Cancelled`] when the consumer went away.
pub async fn analyze(
    ctx: &ServiceContext,
    settings: &Settings,
    repo: &RepoRef,
    mut sink: EventSink,
) -> Result<(), AnalysisError> {
    sink.log(format!("Scanning {repo}...")).await?;
    let snapshot = match deep_scan(ctx.repo.as_ref(), repo, &settings.timings).await {
        Ok(snapshot) => snapshot,
        Err(message) => {
            sink.log(format!("Scan failed: {message}")).await?;
            return Err(AnalysisError::Scan(message));
        }
    };
    sink.log(format!("Found {} relevant files.", snapshot.files.len())).await?;
    sink.emit(RunEvent::Files { files: snapshot.paths() }).await?;
    sink.log(format!("Detected stack: {}", snapshot.profile.summary())).await?;

    sink.log("Generating modernization recommendation...").await?;
    let (recommendation, source) = recommend(ctx, settings, repo, &snapshot).await;
    info!(?source, files = snapshot.files.len(), "analysis complete");

    let report = AnalysisReport {
        repo: repo.to_string(),
        file_count: snapshot.files.len(),
        preservation_summary: snapshot.preservation_summary,
        tech_stack: snapshot.profile,
        recommendation,
        recommendation_source: source,
    };
    sink.finish(RunEvent::Analysis { data: report }).await?;
    Ok(())
}
