use std::sync::{Arc, Mutex};

use super::*;
use crate::adapters::live::LiveFileSystem;
use crate::adapters::scripted::{
    FixedClock, SandboxJournal, ScriptedLlm, ScriptedRepository, ScriptedSandbox,
};
use crate::config::Timings;
use crate::memory::MemoryRecord;
use crate::ports::llm::LlmError;

const FILES: &[(&str, &str)] = &[
    ("main.py", "from fastapi import FastAPI\napp = FastAPI()\n"),
    ("requirements.txt", "fastapi\nuvicorn\n"),
    ("static/index.html", "<html><body>shop</body></html>"),
];

const PLAN: &str =
    "Keep the API.\n\nBATCH 1 - App:\n- main.py\n- requirements.txt\n- static/index.html\n";

const FLASK_CRASH: &str =
    "Traceback (most recent call last):\nModuleNotFoundError: No module named 'flask'";

fn generated() -> String {
    FILES.iter().map(|(p, _)| format!("<file path=\"{p}\">\nnew {p}\n</file>\n")).collect()
}

fn is_plan_request(prompt: &str) -> bool {
    prompt.starts_with("Create a preservation-first modernization plan")
}

/// Planner returns [`PLAN`]; the coder answers with `coder`.
fn llm(coder: impl Fn() -> Result<String, LlmError> + Send + Sync + 'static) -> ScriptedLlm {
    ScriptedLlm::from_fn(move |request| {
        if is_plan_request(&request.prompt) {
            Ok(PLAN.into())
        } else {
            coder()
        }
    })
}

struct Harness {
    ctx: ServiceContext,
    settings: Settings,
    journal: Arc<Mutex<SandboxJournal>>,
    _memory: tempfile::TempDir,
}

fn harness(llm: ScriptedLlm, sandbox: ScriptedSandbox) -> Harness {
    let memory = tempfile::tempdir().unwrap();
    let settings = Settings {
        memory_dir: memory.path().to_path_buf(),
        timings: Timings::immediate(),
        ..Settings::default()
    };
    let journal = sandbox.journal();
    let ctx = ServiceContext::scripted(llm, ScriptedRepository::new(FILES), sandbox);
    Harness { ctx, settings, journal, _memory: memory }
}

fn request() -> ResurrectRequest {
    ResurrectRequest {
        repo: RepoRef { owner: "acme".into(), name: "shop".into() },
        instructions: String::new(),
    }
}

async fn run(h: &Harness) -> (Result<(), Cancelled>, Vec<RunEvent>) {
    let (sink, mut rx) = channel();
    let orchestrator = Orchestrator::new(&h.ctx, &h.settings);
    let request = request();
    let collect = async {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    };
    tokio::join!(orchestrator.run(&request, sink), collect)
}

fn report(events: &[RunEvent]) -> RunReport {
    let results: Vec<&RunEvent> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(results.len(), 1, "exactly one terminal event");
    assert!(events.last().unwrap().is_terminal(), "terminal event comes last");
    match results[0] {
        RunEvent::Result { data } => data.clone(),
        other => panic!("unexpected terminal event {other:?}"),
    }
}

fn history(h: &Harness) -> Vec<MemoryRecord> {
    let fs = LiveFileSystem;
    let clock = FixedClock(chrono::Utc::now());
    AttemptMemory::new(&fs, &clock, &h.settings.memory_dir).history(&request().repo).unwrap()
}

#[tokio::test]
async fn clean_run_is_resurrected() {
    let h = harness(llm(|| Ok(generated())), ScriptedSandbox::healthy());
    let (outcome, events) = run(&h).await;
    outcome.unwrap();

    assert!(matches!(&events[1], RunEvent::RepoFiles { files } if files.len() == 3));
    let report = report(&events);
    assert_eq!(report.run_id, "run-1");
    assert_eq!(report.status, RunStatus::Resurrected);
    assert_eq!(report.retry_count, 0);
    assert!(report.errors.is_empty());
    assert_eq!(report.artifacts.len(), 3);
    assert!(report.missing_files.is_empty());
    assert!(report.preview.starts_with("https://"), "preview: {}", report.preview);
    assert!(report.logs.starts_with("Initiating deep scan of acme/shop"));

    let journal = h.journal.lock().unwrap();
    assert_eq!(journal.opened, 1);
    assert_eq!(journal.closed, 0, "preview session is left running");

    let outcomes: Vec<Outcome> = history(&h).iter().map(|r| r.outcome).collect();
    assert_eq!(outcomes, vec![Outcome::Started, Outcome::Success]);
    assert!(history(&h)[1].decisions.contains(&"Runtime: python".to_string()));
}

#[tokio::test]
async fn persistent_crash_exhausts_retries() {
    let h = harness(llm(|| Ok(generated())), ScriptedSandbox::crashing(FLASK_CRASH));
    let (outcome, events) = run(&h).await;
    outcome.unwrap();

    let report = report(&events);
    let max = h.settings.max_retries;
    assert_eq!(report.status, RunStatus::Fallback);
    assert_eq!(report.retry_count, max);
    assert_eq!(report.errors.len(), max as usize + 1);
    let attempts: Vec<u32> = report.errors.iter().map(|e| e.attempt).collect();
    assert_eq!(attempts, (1..=max + 1).collect::<Vec<_>>());
    assert_eq!(report.artifacts.len(), 3);

    let journal = h.journal.lock().unwrap();
    assert_eq!(journal.opened, max + 1);
    assert_eq!(journal.closed, max + 1, "every session is torn down");

    let last = history(&h).pop().unwrap();
    assert_eq!(last.outcome, Outcome::Failure);
    assert_eq!(last.error_kind, Some(report.errors[max as usize].kind));
}

#[tokio::test]
async fn crashes_are_auto_healed() {
    let sandbox = ScriptedSandbox::crashing("SyntaxError: invalid syntax");
    let h = harness(llm(|| Ok(generated())), sandbox);
    let (_, events) = run(&h).await;
    let report = report(&events);
    assert!(report.errors.iter().all(|e| e.kind == ErrorKind::BackendCrash));
    assert!(report.logs.contains("Auto-healing: regenerating code (attempt 2/4)"));
    assert!(report.logs.contains("BACKEND_CRASH detected. Initiating auto-heal"));
}

#[tokio::test]
async fn unavailable_sandbox_returns_code_without_retrying() {
    let h = harness(llm(|| Ok(generated())), ScriptedSandbox::unavailable());
    let (_, events) = run(&h).await;

    let report = report(&events);
    assert_eq!(report.status, RunStatus::Fallback);
    assert_eq!(report.retry_count, 0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, ErrorKind::SandboxUnavailable);
    assert_eq!(report.artifacts.len(), 3);
    assert_eq!(h.journal.lock().unwrap().opened, 0);
}

#[tokio::test]
async fn missing_api_key_is_an_error() {
    let h = harness(ScriptedLlm::always(Err(LlmError::MissingApiKey)), ScriptedSandbox::healthy());
    let (_, events) = run(&h).await;

    let report = report(&events);
    assert_eq!(report.status, RunStatus::Error);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, ErrorKind::ConfigurationError);
    assert!(report.artifacts.is_empty());
    assert_eq!(h.journal.lock().unwrap().opened, 0);
}

#[tokio::test]
async fn backend_outage_uses_the_retry_budget() {
    let h = harness(
        llm(|| Err(LlmError::Server { status: 503, message: "overloaded".into() })),
        ScriptedSandbox::healthy(),
    );
    let (_, events) = run(&h).await;

    let report = report(&events);
    assert_eq!(report.status, RunStatus::Fallback);
    assert_eq!(report.retry_count, h.settings.max_retries);
    assert!(report.errors.iter().all(|e| e.kind == ErrorKind::GenerationBackendDown));
    assert!(report.logs.contains("Generation backend unavailable. Waiting 0s before retry 2/4"));
}

#[tokio::test]
async fn planner_outage_degrades_to_fallback() {
    let h = harness(
        ScriptedLlm::from_fn(|request| {
            if is_plan_request(&request.prompt) {
                Err(LlmError::BadRequest { message: "nope".into() })
            } else {
                Ok(generated())
            }
        }),
        ScriptedSandbox::healthy(),
    );
    let (_, events) = run(&h).await;

    let report = report(&events);
    assert_eq!(report.status, RunStatus::Fallback);
    assert!(report.errors.is_empty());
    assert!(report.logs.contains("fallback plan"));
}

#[tokio::test]
async fn dropped_consumer_cancels_the_run() {
    let h = harness(llm(|| Ok(generated())), ScriptedSandbox::healthy());
    let (sink, rx) = channel();
    drop(rx);
    let outcome = Orchestrator::new(&h.ctx, &h.settings).run(&request(), sink).await;
    assert_eq!(outcome, Err(Cancelled));
    assert_eq!(h.journal.lock().unwrap().opened, 0);
}

#[tokio::test]
async fn retry_prompts_carry_the_accumulated_errors() {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&prompts);
    let llm = ScriptedLlm::from_fn(move |request| {
        if is_plan_request(&request.prompt) {
            return Ok(PLAN.into());
        }
        seen.lock().unwrap().push(request.prompt.clone());
        Ok(generated())
    });
    let h = harness(llm, ScriptedSandbox::crashing(FLASK_CRASH));
    run(&h).await.0.unwrap();

    let prompts = prompts.lock().unwrap();
    assert_eq!(prompts.len(), h.settings.max_retries as usize + 1);
    assert!(!prompts[0].contains("AUTOMATIC ERROR RECOVERY"));
    for prompt in &prompts[1..] {
        assert!(prompt.contains("AUTOMATIC ERROR RECOVERY"));
        assert!(prompt.contains("No module named 'flask'"));
    }
}

#[tokio::test]
async fn cancelling_after_boot_releases_the_session() {
    let h = harness(llm(|| Ok(generated())), ScriptedSandbox::yielding());
    let (sink, mut rx) = channel();
    let orchestrator = Orchestrator::new(&h.ctx, &h.settings);
    let request = request();
    let consumer = async move {
        while let Some(event) = rx.recv().await {
            let booting = matches!(
                &event,
                RunEvent::Log { content } if content.starts_with("Booting sandbox")
            );
            if booting {
                break;
            }
        }
    };
    let (outcome, ()) = tokio::join!(orchestrator.run(&request, sink), consumer);

    assert_eq!(outcome, Err(Cancelled));
    let journal = h.journal.lock().unwrap();
    assert_eq!(journal.opened, 1);
    assert_eq!(journal.closed, 1);
}

#[test]
fn preview_prefers_log_url_then_inline_html() {
    let html = vec![FileRecord::new("static/preview.html", "<p>hi</p>")];
    assert_eq!(preview_for("x\n[PREVIEW_URL] https://3000-a.test\n", &html), "https://3000-a.test");
    assert_eq!(preview_for("no url", &html), "<p>hi</p>");
    assert_eq!(preview_for("no url", &[]), "");
}
