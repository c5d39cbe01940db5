//! The resurrect pipeline: deep scan, plan, generate, execute, classify, retry.
//!
//! [`Orchestrator::run`] is the producer half of an event stream. It reports
//! progress through an [`EventSink`] and always finishes with exactly one
//! [`RunEvent::Result`], unless the consumer goes away first. In that case
//! the run stops at its next event and still releases its sandbox session.
//!
//! Attempt failures fall into two groups that share one retry budget:
//! content failures (execution errors found in the sandbox log, empty output)
//! retry with the accumulated error context, while a backend outage waits
//! `outage_backoff * attempt` first.

pub mod events;
pub mod generate;

use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, info_span, warn, Instrument};

use crate::classify::{build_retry_context, classify, truncate_chars, ErrorKind};
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::generation::{GenerationClient, GenerationError};
use crate::memory::{AttemptMemory, Outcome};
use crate::model::{AttemptError, FileRecord, GenerationResult, RunReport, RunStatus, ScanSnapshot};
use crate::plan::generate_plan;
use crate::ports::repository::RepoRef;
use crate::sandbox::{deploy, DeployRequest, SessionSlot, SANDBOX_UNAVAILABLE};
use crate::scan::deep_scan;

pub use events::{channel, Cancelled, EventSink, RunEvent};
use generate::CodeGenerator;

/// Characters of an error kept in a memory record.
const MEMORY_EXCERPT: usize = 200;

/// Why one attempt ended without an execution log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptFailure {
    /// Every model in the generation chain failed.
    #[error("generation backend unavailable: {0}")]
    BackendDown(String),
    /// Generation produced no usable files.
    #[error("{0}")]
    EmptyOutput(String),
    /// A missing API key or similar; retrying cannot help.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Any other pipeline failure.
    #[error("{0}")]
    Pipeline(String),
    /// The event consumer went away.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl From<GenerationError> for AttemptFailure {
    fn from(error: GenerationError) -> Self {
        match error {
            GenerationError::BackendExhausted { .. } => Self::BackendDown(error.to_string()),
            GenerationError::Configuration(message) => Self::Configuration(message),
            GenerationError::Blocked { .. } => Self::Pipeline(error.to_string()),
        }
    }
}

impl AttemptFailure {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::BackendDown(_) => ErrorKind::GenerationBackendDown,
            Self::EmptyOutput(_) => ErrorKind::EmptyGeneration,
            Self::Configuration(_) => ErrorKind::ConfigurationError,
            Self::Pipeline(_) | Self::Cancelled(_) => ErrorKind::Exception,
        }
    }
}

/// Input of a resurrect run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResurrectRequest {
    /// Repository to modernize.
    pub repo: RepoRef,
    /// Free-text user instructions; may be empty.
    pub instructions: String,
}

/// Mutable state of the retry loop.
#[derive(Default)]
struct RunState {
    errors: Vec<AttemptError>,
    retry_count: u32,
    artifacts: Vec<FileRecord>,
    missing: Vec<String>,
    last_log: String,
    succeeded: bool,
    exhausted: bool,
    sandbox_unavailable: bool,
    hard_error: bool,
    decisions: Vec<String>,
}

/// Runs the resurrect pipeline against the ports of a [`ServiceContext`].
pub struct Orchestrator<'a> {
    ctx: &'a ServiceContext,
    settings: &'a Settings,
}

impl<'a> Orchestrator<'a> {
    /// An orchestrator over `ctx` configured by `settings`.
    #[must_use]
    pub fn new(ctx: &'a ServiceContext, settings: &'a Settings) -> Self {
        Self { ctx, settings }
    }

    fn memory(&self) -> AttemptMemory<'_> {
        AttemptMemory::new(self.ctx.fs.as_ref(), self.ctx.clock.as_ref(), &self.settings.memory_dir)
    }

    /// Runs one resurrection, streaming progress into `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] when the consumer dropped the stream.
    pub async fn run(&self, request: &ResurrectRequest, sink: EventSink) -> Result<(), Cancelled> {
        let run_id = self.ctx.id_gen.run_id();
        let span = info_span!("resurrect", %run_id, repo = %request.repo);
        self.run_inner(run_id, request, sink).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: String,
        request: &ResurrectRequest,
        mut sink: EventSink,
    ) -> Result<(), Cancelled> {
        let repo = &request.repo;
        let memory = self.memory();

        sink.log(format!("Initiating deep scan of {repo}...")).await?;
        let snapshot = match deep_scan(self.ctx.repo.as_ref(), repo, &self.settings.timings).await {
            Ok(snapshot) => snapshot,
            Err(message) => {
                sink.log(format!("Scan failed: {message}")).await?;
                let state = RunState {
                    errors: vec![AttemptError { attempt: 1, kind: ErrorKind::Exception, message }],
                    hard_error: true,
                    ..RunState::default()
                };
                return self.finish(run_id, sink, state, false).await;
            }
        };

        let stack = snapshot.profile.summary();
        let mut started = memory.record(Outcome::Started);
        started.tech_stack = Some(stack.clone());
        if let Err(e) = memory.append(repo, started) {
            warn!(error = %e, "could not record attempt start");
        }
        self.report_scan(&snapshot, &mut sink).await?;

        sink.log("Creating preservation-first modernization plan...").await?;
        let timings = &self.settings.timings;
        let client = GenerationClient::new(self.ctx.llm.as_ref(), timings);
        let planned = generate_plan(
            &client,
            &self.settings.planner_model,
            repo,
            &request.instructions,
            &snapshot,
        )
        .await;
        let plan = match planned {
            Ok(plan) => plan,
            Err(error) => {
                let failure = AttemptFailure::from(error);
                sink.log(format!("Cannot continue: {failure}")).await?;
                let state = RunState {
                    errors: vec![AttemptError {
                        attempt: 1,
                        kind: failure.kind(),
                        message: failure.to_string(),
                    }],
                    hard_error: true,
                    ..RunState::default()
                };
                self.remember_failure(repo, &stack, &state);
                return self.finish(run_id, sink, state, false).await;
            }
        };
        if plan.fallback {
            sink.log(
                "Warning: planner unavailable; continuing with a fallback plan built from the scan.",
            )
            .await?;
        }
        sink.debug(format!("Generated plan:\n{}", plan.text)).await?;

        let memory_context = memory.context_for_prompt(repo);
        let coder = GenerationClient::new(self.ctx.llm.as_ref(), timings);
        let generator = CodeGenerator::new(coder, &self.settings.coder_model, timings);
        let mut slot = SessionSlot::new(self.ctx.sandbox.as_ref(), timings);
        let mut state = RunState::default();

        let looped = self
            .retry_loop(
                &plan.text,
                &snapshot,
                &memory_context,
                &generator,
                &mut slot,
                &mut state,
                &mut sink,
            )
            .await;
        if let Err(cancelled) = looped {
            slot.release().await;
            return Err(cancelled);
        }

        if state.succeeded {
            let mut success = memory.record(Outcome::Success);
            success.tech_stack = Some(stack);
            success.decisions = std::mem::take(&mut state.decisions);
            if let Err(e) = memory.append(repo, success) {
                warn!(error = %e, "could not record success");
            }
        } else {
            self.remember_failure(repo, &stack, &state);
        }

        if state.succeeded && self.settings.keep_preview {
            if let Some(id) = slot.detach() {
                info!(session = %id, "preview session kept alive until its remote timeout");
            }
        } else {
            slot.release().await;
        }
        self.finish(run_id, sink, state, plan.fallback).await
    }

    async fn report_scan(
        &self,
        snapshot: &ScanSnapshot,
        sink: &mut EventSink,
    ) -> Result<(), Cancelled> {
        let paths = snapshot.paths();
        if !paths.is_empty() {
            sink.emit(RunEvent::RepoFiles { files: paths }).await?;
        }
        let profile = &snapshot.profile;
        sink.debug(format!(
            "Deep scan complete:\n  Files analyzed: {}\n  Tech stack: {}\n  \
             Must preserve: {} items",
            snapshot.files.len(),
            profile.summary(),
            profile.must_preserve.len()
        ))
        .await?;
        if let Some(database) = &profile.backend.database {
            sink.log(format!("Detected database: {database} (will be preserved)")).await?;
        }
        if let Some(framework) = &profile.backend.framework {
            sink.log(format!("Detected backend: {framework}")).await?;
        }
        if let Some(framework) = &profile.frontend.framework {
            sink.log(format!("Detected frontend: {framework}")).await?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn retry_loop(
        &self,
        plan: &str,
        snapshot: &ScanSnapshot,
        memory_context: &str,
        generator: &CodeGenerator<'_>,
        slot: &mut SessionSlot<'_>,
        state: &mut RunState,
        sink: &mut EventSink,
    ) -> Result<(), Cancelled> {
        let max = self.settings.max_retries;
        loop {
            let attempt = state.retry_count + 1;
            let prompt_plan = if state.errors.is_empty() {
                sink.log("Synthesizing enhanced code...").await?;
                plan.to_string()
            } else {
                let total = max + 1;
                sink.log(format!("Auto-healing: regenerating code (attempt {attempt}/{total})..."))
                    .await?;
                format!("{plan}{}", build_retry_context(&state.errors))
            };

            let outcome =
                self.attempt(&prompt_plan, snapshot, memory_context, generator, slot, sink).await;
            let failure = match outcome {
                Ok((generation, log)) => {
                    state.artifacts.clone_from(&generation.files);
                    state.missing.clone_from(&generation.missing);
                    state.last_log = log;
                    match classify(&state.last_log) {
                        None => {
                            state.succeeded = true;
                            state.decisions = vec![
                                format!("Runtime: {}", generation.runtime),
                                format!("Entrypoint: {}", generation.entrypoint),
                            ];
                            sink.log("Verifying system integrity... all checks passed.").await?;
                            return Ok(());
                        }
                        Some(diagnosis) => {
                            let kind = diagnosis.kind;
                            state.errors.push(AttemptError {
                                attempt,
                                kind,
                                message: diagnosis.context,
                            });
                            if kind == ErrorKind::SandboxUnavailable {
                                state.sandbox_unavailable = true;
                                sink.log(
                                    "Sandbox unavailable; returning the generated code without execution.",
                                )
                                .await?;
                                return Ok(());
                            }
                            if state.retry_count < max {
                                let message = format!("{kind} detected. Initiating auto-heal...");
                                sink.log(message).await?;
                                state.retry_count += 1;
                                continue;
                            }
                            sink.log(format!(
                                "Auto-heal failed after {} attempts. Proceeding with partial result.",
                                max + 1
                            ))
                            .await?;
                            state.exhausted = true;
                            return Ok(());
                        }
                    }
                }
                Err(AttemptFailure::Cancelled(cancelled)) => return Err(cancelled),
                Err(failure) => failure,
            };

            let message = failure.to_string();
            state.errors.push(AttemptError {
                attempt,
                kind: failure.kind(),
                message: message.clone(),
            });
            state.last_log = message.clone();
            if let AttemptFailure::Configuration(_) = failure {
                sink.log(format!("Cannot continue: {message}")).await?;
                state.hard_error = true;
                return Ok(());
            }
            if state.retry_count >= max {
                sink.log(format!(
                    "Giving up after {} attempts: {}",
                    max + 1,
                    truncate_chars(&message, 150)
                ))
                .await?;
                state.exhausted = true;
                return Ok(());
            }

            let pause = match failure {
                AttemptFailure::BackendDown(_) => {
                    let wait = self.settings.timings.outage_backoff * (state.retry_count + 1);
                    sink.log(format!(
                        "Generation backend unavailable. Waiting {}s before retry {}/{}...",
                        wait.as_secs(),
                        attempt + 1,
                        max + 1
                    ))
                    .await?;
                    wait
                }
                _ => {
                    let excerpt = truncate_chars(&message, 150);
                    sink.log(format!("Attempt failed: {excerpt}. Retrying...")).await?;
                    self.settings.timings.exception_pause
                }
            };
            tokio::time::sleep(pause).await;
            state.retry_count += 1;
        }
    }

    /// Generates and executes once, returning the files and the execution log.
    async fn attempt(
        &self,
        plan: &str,
        snapshot: &ScanSnapshot,
        memory_context: &str,
        generator: &CodeGenerator<'_>,
        slot: &mut SessionSlot<'_>,
        sink: &mut EventSink,
    ) -> Result<(GenerationResult, String), AttemptFailure> {
        let generation = generator.generate(plan, snapshot, memory_context, sink).await?;
        let paths: Vec<&str> = generation.files.iter().map(|f| f.path.as_str()).collect();
        sink.debug(format!("Generated files: {}", paths.join(", "))).await?;
        sink.log(format!("Generated {} files.", generation.files.len())).await?;
        if !generation.missing.is_empty() {
            sink.log(format!(
                "{} files were not regenerated: {}",
                generation.missing.len(),
                generation.missing.join(", ")
            ))
            .await?;
        }
        sink.log(format!(
            "Detected runtime: {} | Entrypoint: {}",
            generation.runtime, generation.entrypoint
        ))
        .await?;

        let log = if self.ctx.sandbox.is_available() {
            sink.log("Booting sandbox environment...").await?;
            match slot.acquire().await {
                Ok(session) => {
                    let request = DeployRequest {
                        files: &generation.files,
                        entrypoint: &generation.entrypoint,
                        runtime: generation.runtime,
                    };
                    deploy(session, &request, &self.settings.timings).await
                }
                Err(e) => format!("Sandbox Error: {e}"),
            }
        } else {
            SANDBOX_UNAVAILABLE.to_string()
        };
        sink.debug(format!("Sandbox output:\n{log}")).await?;
        Ok((generation, log))
    }

    fn remember_failure(&self, repo: &RepoRef, stack: &str, state: &RunState) {
        let memory = self.memory();
        let mut record = memory.record(Outcome::Failure);
        record.tech_stack = Some(stack.to_string());
        if let Some(last) = state.errors.last() {
            record.error_kind = Some(last.kind);
            record.decisions.push(format!("Attempt {}", last.attempt));
            record.decisions.push(truncate_chars(&last.message, MEMORY_EXCERPT).to_string());
        }
        if let Err(e) = memory.append(repo, record) {
            warn!(error = %e, "could not record failure");
        }
    }

    async fn finish(
        &self,
        run_id: String,
        sink: EventSink,
        state: RunState,
        fallback_plan: bool,
    ) -> Result<(), Cancelled> {
        let status = if state.hard_error {
            RunStatus::Error
        } else if fallback_plan || state.exhausted || state.sandbox_unavailable {
            RunStatus::Fallback
        } else {
            RunStatus::Resurrected
        };
        let report = RunReport {
            run_id,
            logs: sink.transcript(),
            preview: preview_for(&state.last_log, &state.artifacts),
            artifacts: state.artifacts,
            status,
            retry_count: state.retry_count,
            errors: state.errors,
            missing_files: state.missing,
        };
        info!(status = ?report.status, retries = report.retry_count, "run finished");
        sink.finish(RunEvent::Result { data: report }).await
    }
}

fn preview_pattern() -> Option<&'static Regex> {
    static PREVIEW: OnceLock<Option<Regex>> = OnceLock::new();
    PREVIEW.get_or_init(|| Regex::new(r"\[PREVIEW_URL\] (https://\S+)").ok()).as_ref()
}

/// Preview for a finished run: the first `[PREVIEW_URL]` in the execution
/// log, else the content of a generated `preview.html`, else empty.
#[must_use]
pub fn preview_for(log: &str, artifacts: &[FileRecord]) -> String {
    if let Some(caps) = preview_pattern().and_then(|p| p.captures(log)) {
        return caps[1].to_string();
    }
    artifacts
        .iter()
        .find(|f| f.path.ends_with("preview.html"))
        .map(|f| f.content.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests;
