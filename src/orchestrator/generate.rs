//! One generation cycle: single call or batches, then missing-file recovery.

use std::collections::HashSet;
use std::fmt::Write as _;

use tracing::{debug, info, warn};

use super::events::EventSink;
use super::AttemptFailure;
use crate::batch::plan_batches;
use crate::config::Timings;
use crate::entrypoint;
use crate::generation::{model_char_budget, GenerationClient, GenerationError};
use crate::model::{basename, total_chars, Batch, FileRecord, GenerationResult, ScanSnapshot};
use crate::parser::parse_with_strategy;
use crate::prompts::{self, BatchPrompt};

/// Largest file count handled in one call.
pub const SINGLE_CALL_MAX_FILES: usize = 150;
/// Most missing files a single recovery call will attempt.
pub const RECOVERY_MAX_FILES: usize = 15;
/// Name of the batch that regenerates missing files.
pub const RECOVERY_BATCH: &str = "Recovery - Missing Files";

/// Whether the whole file set fits one call to `model`.
#[must_use]
pub fn fits_single_call(files: &[FileRecord], model: &str) -> bool {
    files.len() <= SINGLE_CALL_MAX_FILES && total_chars(files) * 10 < model_char_budget(model) * 7
}

/// Expected paths with no generated counterpart. A generated file with the
/// same basename counts as a counterpart.
#[must_use]
pub fn missing_paths(expected: &[FileRecord], generated: &[FileRecord]) -> Vec<String> {
    let exact: HashSet<&str> = generated.iter().map(|f| f.path.as_str()).collect();
    let basenames: HashSet<&str> = generated.iter().map(FileRecord::basename).collect();
    expected
        .iter()
        .filter(|f| !exact.contains(f.path.as_str()) && !basenames.contains(basename(&f.path)))
        .map(|f| f.path.clone())
        .collect()
}

/// Merges `incoming` into `files`; a later file replaces an earlier one with the same path.
fn merge(files: &mut Vec<FileRecord>, incoming: Vec<FileRecord>) {
    for file in incoming {
        match files.iter_mut().find(|f| f.path == file.path) {
            Some(existing) => *existing = file,
            None => files.push(file),
        }
    }
}

fn parse(text: &str, label: &str) -> Vec<FileRecord> {
    let outcome = parse_with_strategy(text);
    debug!(label, files = outcome.files.len(), strategy = ?outcome.strategy, "parsed response");
    outcome.files
}

/// Drives the coder model for one attempt.
pub struct CodeGenerator<'a> {
    client: GenerationClient<'a>,
    model: &'a str,
    timings: &'a Timings,
}

impl<'a> CodeGenerator<'a> {
    /// A generator that prompts `model` through `client`.
    #[must_use]
    pub fn new(client: GenerationClient<'a>, model: &'a str, timings: &'a Timings) -> Self {
        Self { client, model, timings }
    }

    /// Generates the file set for `plan`.
    ///
    /// # Errors
    ///
    /// Returns [`AttemptFailure::BackendDown`] when a lone batch exhausts the
    /// model chain, [`AttemptFailure::EmptyOutput`] when nothing parses, and
    /// [`AttemptFailure::Cancelled`] when the event consumer is gone.
    pub async fn generate(
        &self,
        plan: &str,
        snapshot: &ScanSnapshot,
        memory_context: &str,
        sink: &mut EventSink,
    ) -> Result<GenerationResult, AttemptFailure> {
        let files = if fits_single_call(&snapshot.files, self.model) {
            let chars = total_chars(&snapshot.files);
            info!(files = snapshot.files.len(), chars, "single-call generation");
            self.single_call(plan, snapshot, memory_context).await?
        } else {
            self.batched(plan, snapshot, memory_context, sink).await?
        };

        if files.is_empty() {
            return Err(AttemptFailure::EmptyOutput(
                "CODE GENERATION FAILED: No files were generated".to_string(),
            ));
        }
        let missing = missing_paths(&snapshot.files, &files);
        if !missing.is_empty() {
            warn!(count = missing.len(), "generation left files missing");
        }
        let (entrypoint, runtime) = entrypoint::infer(&files);
        Ok(GenerationResult { files, entrypoint, runtime, missing })
    }

    async fn single_call(
        &self,
        plan: &str,
        snapshot: &ScanSnapshot,
        memory_context: &str,
    ) -> Result<Vec<FileRecord>, AttemptFailure> {
        let prompt = prompts::generation_prompt(plan, snapshot, memory_context);
        let text = self.client.generate(&prompt, self.model).await.map_err(AttemptFailure::from)?;
        let files = parse(&text, "single call");
        if files.is_empty() {
            let preview: String = text.chars().take(200).collect();
            return Err(AttemptFailure::EmptyOutput(format!(
                "CODE GENERATION FAILED: model returned {} chars but no parseable files. \
                 Preview: {preview}",
                text.len()
            )));
        }
        Ok(files)
    }

    async fn batched(
        &self,
        plan: &str,
        snapshot: &ScanSnapshot,
        memory_context: &str,
        sink: &mut EventSink,
    ) -> Result<Vec<FileRecord>, AttemptFailure> {
        let batches = plan_batches(&snapshot.files, plan, model_char_budget(self.model));
        let all_paths = snapshot.paths();
        sink.log(format!(
            "Multi-batch generation: {} files in {} batches",
            snapshot.files.len(),
            batches.len()
        ))
        .await?;

        let mut generated = Vec::new();
        let mut summaries = String::new();
        for (index, batch) in batches.iter().enumerate() {
            sink.log(format!(
                "Generating batch {}/{}: {} ({} files)...",
                index + 1,
                batches.len(),
                batch.name,
                batch.files.len()
            ))
            .await?;
            let prompt = BatchPrompt {
                plan,
                batch,
                index,
                total: batches.len(),
                all_paths: &all_paths,
                summaries: &summaries,
                memory_context: if index == 0 { memory_context } else { "" },
            }
            .render();

            match self.client.generate(&prompt, self.model).await {
                Ok(text) => {
                    let files = parse(&text, &batch.name);
                    info!(
                        batch = %batch.name,
                        generated = files.len(),
                        expected = batch.files.len(),
                        "batch done"
                    );
                    if !files.is_empty() {
                        let _ = write!(
                            summaries,
                            "\n\n=== Batch {}: {} ===\n{}",
                            index + 1,
                            batch.name,
                            prompts::batch_summary(&files)
                        );
                    }
                    merge(&mut generated, files);
                }
                Err(GenerationError::Configuration(message)) => {
                    return Err(AttemptFailure::Configuration(message));
                }
                Err(error @ GenerationError::BackendExhausted { .. }) => {
                    if batches.len() == 1 {
                        return Err(AttemptFailure::BackendDown(error.to_string()));
                    }
                    sink.log(format!(
                        "Batch {} hit a backend outage; waiting {}s and moving on...",
                        index + 1,
                        self.timings.batch_outage_pause.as_secs()
                    ))
                    .await?;
                    tokio::time::sleep(self.timings.batch_outage_pause).await;
                    continue;
                }
                Err(error @ GenerationError::Blocked { .. }) => {
                    warn!(batch = %batch.name, %error, "batch skipped");
                    let number = index + 1;
                    sink.log(format!("Batch {number} was refused by the model; skipping it"))
                        .await?;
                    continue;
                }
            }

            if index + 1 < batches.len() {
                tokio::time::sleep(self.timings.batch_cooldown).await;
            }
        }

        self.recover(plan, snapshot, &all_paths, &summaries, &mut generated, batches.len(), sink)
            .await?;
        Ok(generated)
    }

    /// Regenerates files the batches missed, when there are few enough.
    #[allow(clippy::too_many_arguments)]
    async fn recover(
        &self,
        plan: &str,
        snapshot: &ScanSnapshot,
        all_paths: &[String],
        summaries: &str,
        generated: &mut Vec<FileRecord>,
        batch_count: usize,
        sink: &mut EventSink,
    ) -> Result<(), AttemptFailure> {
        let missing = missing_paths(&snapshot.files, generated);
        if missing.is_empty() {
            return Ok(());
        }
        if missing.len() > RECOVERY_MAX_FILES {
            warn!(count = missing.len(), "too many missing files for one recovery call");
            let count = missing.len();
            sink.log(format!("{count} files missing; too many to recover in one call")).await?;
            return Ok(());
        }

        sink.log(format!("Recovering {} missing files...", missing.len())).await?;
        let batch = Batch {
            name: RECOVERY_BATCH.to_string(),
            files: snapshot.files.iter().filter(|f| missing.contains(&f.path)).cloned().collect(),
        };
        let prompt = BatchPrompt {
            plan,
            batch: &batch,
            index: batch_count,
            total: batch_count + 1,
            all_paths,
            summaries,
            memory_context: "",
        }
        .render();

        tokio::time::sleep(self.timings.batch_cooldown).await;
        match self.client.generate(&prompt, self.model).await {
            Ok(text) => {
                let recovered = parse(&text, RECOVERY_BATCH);
                if recovered.is_empty() {
                    warn!("recovery call returned no parseable files");
                } else {
                    info!(recovered = recovered.len(), "recovered missing files");
                    merge(generated, recovered);
                }
            }
            Err(GenerationError::Configuration(message)) => {
                return Err(AttemptFailure::Configuration(message));
            }
            Err(error) => warn!(%error, "recovery call failed"),
        }
        Ok(())
    }
}
