use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::ports::sandbox::{CommandOutput, CommandSpec, SandboxProvider, SandboxSession};
use crate::ports::PortFuture;

/// Everything the scripted sandbox saw.
#[derive(Debug, Default)]
pub struct SandboxJournal {
    pub opened: u32,
    pub closed: u32,
    pub writes: Vec<String>,
    pub commands: Vec<String>,
}

/// Sandbox whose health checks all pass or all fail.
pub struct ScriptedSandbox {
    available: bool,
    healthy: bool,
    yielding: bool,
    app_log: String,
    journal: Arc<Mutex<SandboxJournal>>,
}

impl ScriptedSandbox {
    pub fn healthy() -> Self {
        Self {
            available: true,
            healthy: true,
            yielding: false,
            app_log: "INFO:     Uvicorn running on http://0.0.0.0:8000".to_string(),
            journal: Arc::default(),
        }
    }

    pub fn crashing(app_log: &str) -> Self {
        Self { healthy: false, app_log: app_log.to_string(), ..Self::healthy() }
    }

    pub fn unavailable() -> Self {
        Self { available: false, ..Self::healthy() }
    }

    /// Healthy, but every file write yields to the scheduler once.
    pub fn yielding() -> Self {
        Self { yielding: true, ..Self::healthy() }
    }

    pub fn journal(&self) -> Arc<Mutex<SandboxJournal>> {
        Arc::clone(&self.journal)
    }
}

impl SandboxProvider for ScriptedSandbox {
    fn is_available(&self) -> bool {
        self.available
    }

    fn open(&self, _lifetime: Duration) -> PortFuture<'_, Box<dyn SandboxSession>> {
        Box::pin(async move {
            let mut journal = self.journal.lock().unwrap();
            journal.opened += 1;
            let session: Box<dyn SandboxSession> = Box::new(ScriptedSession {
                id: format!("sbx{}", journal.opened),
                healthy: self.healthy,
                yielding: self.yielding,
                app_log: self.app_log.clone(),
                journal: Arc::clone(&self.journal),
            });
            Ok(session)
        })
    }
}

struct ScriptedSession {
    id: String,
    healthy: bool,
    yielding: bool,
    app_log: String,
    journal: Arc<Mutex<SandboxJournal>>,
}

impl SandboxSession for ScriptedSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn write_file<'a>(&'a self, path: &'a str, _content: &'a str) -> PortFuture<'a, ()> {
        self.journal.lock().unwrap().writes.push(path.to_string());
        let yielding = self.yielding;
        Box::pin(async move {
            if yielding {
                tokio::task::yield_now().await;
            }
            Ok(())
        })
    }

    fn run<'a>(&'a self, command: &'a CommandSpec) -> PortFuture<'a, CommandOutput> {
        self.journal.lock().unwrap().commands.push(command.command.clone());
        let port_check = command.command.contains("urlopen");
        let stdout = match (port_check, self.healthy) {
            (true, true) => "200".to_string(),
            (true, false) => "down".to_string(),
            (false, _) => String::new(),
        };
        Box::pin(async move { Ok(CommandOutput { exit_code: 0, stdout, stderr: String::new() }) })
    }

    fn read_file<'a>(&'a self, _path: &'a str) -> PortFuture<'a, String> {
        let log = self.app_log.clone();
        Box::pin(async move { Ok(log) })
    }

    fn host(&self, port: u16) -> String {
        format!("{port}-{}.sandbox.test", self.id)
    }

    fn close(&self) -> PortFuture<'_, ()> {
        self.journal.lock().unwrap().closed += 1;
        Box::pin(async { Ok(()) })
    }
}
