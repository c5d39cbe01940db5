use std::collections::BTreeSet;
use std::fmt::Write as _;

use tracing::{debug, info, warn};

use crate::classify::truncate_chars;
use crate::config::Timings;
use crate::deps::{infer_python_packages, node_dependencies, NODE_BASELINE};
use crate::model::{basename, FileRecord, Runtime};
use crate::ports::sandbox::{CommandOutput, CommandSpec, SandboxSession};
use crate::ports::PortError;
use crate::sanitize::sanitize_path;

const PYTHON_PORT: u16 = 8000;
const NODE_PORTS: &[u16] = &[3000, 3001, 8000, 8080, 5000, 4000, 5001];
const FRONTEND_PORT: u16 = 3000;
const INSTALL_TIMEOUT: u64 = 300;
const BUILD_TIMEOUT: u64 = 600;
const CHECK_TIMEOUT: u64 = 10;
/// Poll index (zero-based) after which the app log is checked for crashes.
const CRASH_CHECK_POLL: u32 = 4;
const CRASH_INDICATORS: &[&str] = &[
    "SyntaxError",
    "ImportError",
    "ModuleNotFoundError",
    "NameError",
    "IndentationError",
    "AttributeError: module",
];

/// Port check; prints the HTTP status, or `down` when nothing answers.
const PORT_CHECK_SCRIPT: &str = "python3 -c \"
import urllib.request, urllib.error
try:
    print(urllib.request.urlopen('http://localhost:{port}', timeout=2).status)
except urllib.error.HTTPError as e:
    print(e.code)
except Exception:
    print('down')
\"";

/// What to deploy.
#[derive(Debug, Clone, Copy)]
pub struct DeployRequest<'a> {
    /// Generated files, unsanitised paths.
    pub files: &'a [FileRecord],
    /// Entrypoint path as inferred from `files`.
    pub entrypoint: &'a str,
    /// Runtime that starts the entrypoint.
    pub runtime: Runtime,
}

enum Backend {
    Running { port: u16 },
    Failed(String),
}

/// Deploys the files into `session` and returns the execution log.
///
/// Never fails: transport errors become `Sandbox Error: ...` text so that the
/// classifier sees them like any other log.
pub async fn deploy(
    session: &dyn SandboxSession,
    request: &DeployRequest<'_>,
    timings: &Timings,
) -> String {
    match try_deploy(session, request, timings).await {
        Ok(log) => log,
        Err(e) => {
            warn!(error = %e, "sandbox deploy aborted");
            format!("Sandbox Error: {e}")
        }
    }
}

async fn try_deploy(
    session: &dyn SandboxSession,
    request: &DeployRequest<'_>,
    timings: &Timings,
) -> Result<String, PortError> {
    let files: Vec<FileRecord> = request
        .files
        .iter()
        .map(|f| FileRecord { path: sanitize_path(&f.path), ..f.clone() })
        .collect();
    let entrypoint = sanitize_path(request.entrypoint);
    let mut notes = Vec::new();

    write_files(session, &files).await?;
    notes.push(format!("Wrote {} files.", files.len()));

    let backend = match request.runtime {
        Runtime::Python => start_python(session, &files, &entrypoint, timings, &mut notes).await?,
        Runtime::Node => start_node(session, &files, &entrypoint, timings, &mut notes).await?,
    };
    let port = match backend {
        Backend::Running { port } => port,
        Backend::Failed(log) => return Ok(log),
    };
    let backend_host = session.host(port);
    notes.push(format!("Backend Server started on port {port}."));

    let frontend = start_frontend(session, &files, &backend_host, timings, &mut notes).await?;
    let preview_host = match frontend {
        Ok(Some(host)) => host,
        Ok(None) => backend_host.clone(),
        Err(failure) => return Ok(failure),
    };

    let mut log = notes.join("\n");
    let _ = write!(
        log,
        "\n[BACKEND_URL] https://{backend_host}\n[PREVIEW_URL] https://{preview_host}"
    );
    Ok(log)
}

async fn write_files(session: &dyn SandboxSession, files: &[FileRecord]) -> Result<(), PortError> {
    let dirs: BTreeSet<&str> =
        files.iter().filter_map(|f| f.path.rsplit_once('/').map(|(dir, _)| dir)).collect();
    if !dirs.is_empty() {
        let quoted: Vec<String> = dirs.iter().map(|d| format!("'{d}'")).collect();
        let mkdir = format!("mkdir -p {}", quoted.join(" "));
        session.run(&CommandSpec::new(mkdir, CHECK_TIMEOUT)).await?;
    }
    for file in files {
        session.write_file(&file.path, &file.content).await?;
    }
    debug!(count = files.len(), "files written to sandbox");
    Ok(())
}

async fn install(
    session: &dyn SandboxSession,
    label: &str,
    command: String,
    notes: &mut Vec<String>,
) -> Result<CommandOutput, PortError> {
    let output = session.run(&CommandSpec::new(command, INSTALL_TIMEOUT)).await?;
    if output.success() {
        notes.push(format!("{label}: ok."));
    } else {
        warn!(step = label, code = output.exit_code, "install step failed");
        notes.push(format!("{label}: exit code {}.", output.exit_code));
    }
    Ok(output)
}

async fn start_python(
    session: &dyn SandboxSession,
    files: &[FileRecord],
    entrypoint: &str,
    timings: &Timings,
    notes: &mut Vec<String>,
) -> Result<Backend, PortError> {
    if let Some(requirements) = files.iter().find(|f| f.basename() == "requirements.txt") {
        let command = format!("pip install -q -r '{}'", requirements.path);
        install(session, "requirements", command, notes).await?;
    }
    let packages: Vec<String> =
        infer_python_packages(files).iter().map(|p| format!("'{p}'")).collect();
    let command = format!("pip install -q {}", packages.join(" "));
    install(session, "inferred packages", command, notes).await?;
    install(session, "bcrypt pin", "pip install -q 'bcrypt==4.0.1'".to_string(), notes).await?;

    session.run(&CommandSpec::background(format!("python3 '{entrypoint}' > app.log 2>&1"))).await?;
    info!(entrypoint, "python backend starting");

    for poll in 0..timings.health_max_polls {
        tokio::time::sleep(timings.health_poll_interval).await;
        if poll == CRASH_CHECK_POLL {
            let log = read_log(session, "app.log").await;
            if CRASH_INDICATORS.iter().any(|marker| log.contains(marker)) {
                return Ok(Backend::Failed(format!("BACKEND_CRASH: {}", truncate_chars(&log, 800))));
            }
        }
        if port_answers(session, PYTHON_PORT).await? {
            return Ok(Backend::Running { port: PYTHON_PORT });
        }
    }
    let log = read_log(session, "app.log").await;
    Ok(Backend::Failed(format!("BACKEND_CRASH: {}", truncate_chars(&log, 800))))
}

async fn start_node(
    session: &dyn SandboxSession,
    files: &[FileRecord],
    entrypoint: &str,
    timings: &Timings,
    notes: &mut Vec<String>,
) -> Result<Backend, PortError> {
    let dir = entrypoint.rsplit_once('/').map_or(".", |(dir, _)| dir);
    let local_manifest = format!("{dir}/package.json");
    let manifest = files
        .iter()
        .find(|f| f.path == local_manifest || (dir == "." && f.path == "package.json"))
        .or_else(|| {
            files
                .iter()
                .find(|f| f.basename() == "package.json" && !f.path.starts_with("frontend/"))
        });

    let declared = manifest.map(|m| node_dependencies(&m.content)).unwrap_or_default();
    let baseline = NODE_BASELINE.join(" ");
    match manifest {
        Some(manifest) => {
            let manifest_dir = manifest.path.rsplit_once('/').map_or(".", |(d, _)| d);
            let command = if declared.is_empty() {
                debug!(manifest = %manifest.path, "manifest declares no dependencies");
                format!("cd '{manifest_dir}' && npm install {baseline}")
            } else {
                debug!(
                    count = declared.len(),
                    manifest = %manifest.path,
                    "installing node dependencies"
                );
                format!("cd '{manifest_dir}' && npm install")
            };
            install(session, "npm install", command, notes).await?;
        }
        None => {
            let command =
                format!("cd '{dir}' && npm init -y > /dev/null && npm install {baseline}");
            install(session, "npm baseline", command, notes).await?;
        }
    }

    let script = basename(entrypoint);
    let start = format!("cd '{dir}' && node '{script}' > app.log 2>&1");
    session.run(&CommandSpec::background(start)).await?;
    info!(entrypoint, "node backend starting");

    for _ in 0..timings.health_max_polls {
        tokio::time::sleep(timings.health_poll_interval).await;
        for &port in NODE_PORTS {
            if port_answers(session, port).await? {
                return Ok(Backend::Running { port });
            }
        }
    }
    let waited = timings.health_poll_interval * timings.health_max_polls;
    let log = read_log(session, &format!("{dir}/app.log")).await;
    Ok(Backend::Failed(format!(
        "FATAL: Node.js Backend failed to start after {} seconds.\n\n=== APP.LOG ===\n{}",
        waited.as_secs(),
        truncate_chars(&log, 2000)
    )))
}

/// Starts a frontend when one exists.
///
/// The inner result is `Ok(Some(host))` for a started frontend, `Ok(None)`
/// when there is nothing to start, and `Err(log)` for a failed build.
async fn start_frontend(
    session: &dyn SandboxSession,
    files: &[FileRecord],
    backend_host: &str,
    timings: &Timings,
    notes: &mut Vec<String>,
) -> Result<Result<Option<String>, String>, PortError> {
    if files.iter().any(|f| f.path == "frontend/package.json") {
        let env = format!("NEXT_PUBLIC_API_URL=https://{backend_host}\n");
        session.write_file("frontend/.env.local", &env).await?;
        let command = "cd frontend && npm install".to_string();
        install(session, "frontend install", command, notes).await?;
        let build_spec = CommandSpec::new("cd frontend && npm run build", BUILD_TIMEOUT);
        let build = session.run(&build_spec).await?;
        if !build.success() {
            let output = if build.stderr.trim().is_empty() { &build.stdout } else { &build.stderr };
            let skip = output.chars().count().saturating_sub(1500);
            let tail: String = output.chars().skip(skip).collect();
            return Ok(Err(format!("FRONTEND BUILD FAILED:\n\n{tail}")));
        }
        session
            .run(&CommandSpec::background(format!(
                "cd frontend && npm start -- -p {FRONTEND_PORT} > frontend.log 2>&1"
            )))
            .await?;
        for _ in 0..timings.health_max_polls {
            tokio::time::sleep(timings.health_poll_interval).await;
            if port_answers(session, FRONTEND_PORT).await? {
                break;
            }
        }
        notes.push(format!("Frontend started on port {FRONTEND_PORT}."));
        return Ok(Ok(Some(session.host(FRONTEND_PORT))));
    }

    let static_root = files
        .iter()
        .find(|f| f.path == "index.html" || f.path == "frontend/index.html")
        .map(|f| f.path.rsplit_once('/').map_or(".", |(d, _)| d));
    if let Some(dir) = static_root {
        session
            .run(&CommandSpec::background(format!(
                "cd '{dir}' && python3 -m http.server {FRONTEND_PORT} > frontend.log 2>&1"
            )))
            .await?;
        notes.push(format!("Static frontend served on port {FRONTEND_PORT}."));
        return Ok(Ok(Some(session.host(FRONTEND_PORT))));
    }
    Ok(Ok(None))
}

async fn port_answers(session: &dyn SandboxSession, port: u16) -> Result<bool, PortError> {
    let script = PORT_CHECK_SCRIPT.replace("{port}", &port.to_string());
    let output = session.run(&CommandSpec::new(script, CHECK_TIMEOUT)).await?;
    Ok(output.stdout.trim().parse::<u16>().is_ok())
}

async fn read_log(session: &dyn SandboxSession, path: &str) -> String {
    session.read_file(path).await.unwrap_or_else(|e| format!("(could not read {path}: {e})"))
}
