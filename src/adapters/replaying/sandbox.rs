use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{replay_result, replay_value};
use crate::cassette::ports::SANDBOX;
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::sandbox::{CommandOutput, CommandSpec, SandboxProvider, SandboxSession};
use crate::ports::PortFuture;

/// Serves recorded sandbox sessions.
pub struct ReplayingSandbox {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingSandbox {
    /// Replays from `replayer`.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self { replayer: Arc::new(Mutex::new(replayer)) }
    }
}

impl SandboxProvider for ReplayingSandbox {
    fn is_available(&self) -> bool {
        replay_value(&self.replayer, SANDBOX, "is_available")
    }

    fn open(&self, _lifetime: Duration) -> PortFuture<'_, Box<dyn SandboxSession>> {
        let opened = replay_result::<String>(&self.replayer, SANDBOX, "open").map(|id| {
            let session: Box<dyn SandboxSession> =
                Box::new(ReplayedSession { id, replayer: Arc::clone(&self.replayer) });
            session
        });
        Box::pin(async move { opened })
    }
}

struct ReplayedSession {
    id: String,
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl SandboxSession for ReplayedSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn write_file<'a>(&'a self, _path: &'a str, _content: &'a str) -> PortFuture<'a, ()> {
        let result = replay_result(&self.replayer, SANDBOX, "write_file");
        Box::pin(async move { result })
    }

    fn run<'a>(&'a self, _command: &'a CommandSpec) -> PortFuture<'a, CommandOutput> {
        let result = replay_result(&self.replayer, SANDBOX, "run");
        Box::pin(async move { result })
    }

    fn read_file<'a>(&'a self, _path: &'a str) -> PortFuture<'a, String> {
        let result = replay_result(&self.replayer, SANDBOX, "read_file");
        Box::pin(async move { result })
    }

    fn host(&self, _port: u16) -> String {
        replay_value(&self.replayer, SANDBOX, "host")
    }

    fn close(&self) -> PortFuture<'_, ()> {
        let result = replay_result(&self.replayer, SANDBOX, "close");
        Box::pin(async move { result })
    }
}
