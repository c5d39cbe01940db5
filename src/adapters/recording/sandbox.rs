use std::time::Duration;

use serde_json::json;

use super::{record_result, record_value};
use crate::cassette::ports::SANDBOX;
use crate::cassette::session::SharedRecorder;
use crate::ports::sandbox::{CommandOutput, CommandSpec, SandboxProvider, SandboxSession};
use crate::ports::PortFuture;

/// Records sandbox sessions and every call made on them.
pub struct RecordingSandbox {
    inner: Box<dyn SandboxProvider>,
    recorder: SharedRecorder,
}

impl RecordingSandbox {
    /// Wraps `inner`.
    pub fn new(inner: Box<dyn SandboxProvider>, recorder: SharedRecorder) -> Self {
        Self { inner, recorder }
    }
}

impl SandboxProvider for RecordingSandbox {
    fn is_available(&self) -> bool {
        let available = self.inner.is_available();
        record_value(&self.recorder, SANDBOX, "is_available", json!({}), &available);
        available
    }

    fn open(&self, lifetime: Duration) -> PortFuture<'_, Box<dyn SandboxSession>> {
        Box::pin(async move {
            let result = self.inner.open(lifetime).await;
            let id = result.as_ref().map(|session| session.id().to_string());
            let input = json!({ "lifetime_secs": lifetime.as_secs() });
            record_result(&self.recorder, SANDBOX, "open", input, &id);
            let session: Box<dyn SandboxSession> =
                Box::new(RecordedSession { inner: result?, recorder: self.recorder.clone() });
            Ok(session)
        })
    }
}

struct RecordedSession {
    inner: Box<dyn SandboxSession>,
    recorder: SharedRecorder,
}

impl SandboxSession for RecordedSession {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn write_file<'a>(&'a self, path: &'a str, content: &'a str) -> PortFuture<'a, ()> {
        Box::pin(async move {
            let result = self.inner.write_file(path, content).await;
            record_result(&self.recorder, SANDBOX, "write_file", json!({ "path": path }), &result);
            result
        })
    }

    fn run<'a>(&'a self, command: &'a CommandSpec) -> PortFuture<'a, CommandOutput> {
        Box::pin(async move {
            let result = self.inner.run(command).await;
            record_result(&self.recorder, SANDBOX, "run", json!(command), &result);
            result
        })
    }

    fn read_file<'a>(&'a self, path: &'a str) -> PortFuture<'a, String> {
        Box::pin(async move {
            let result = self.inner.read_file(path).await;
            record_result(&self.recorder, SANDBOX, "read_file", json!({ "path": path }), &result);
            result
        })
    }

    fn host(&self, port: u16) -> String {
        let host = self.inner.host(port);
        record_value(&self.recorder, SANDBOX, "host", json!({ "port": port }), &host);
        host
    }

    fn close(&self) -> PortFuture<'_, ()> {
        Box::pin(async move {
            let result = self.inner.close().await;
            let input = json!({ "id": self.inner.id() });
            record_result(&self.recorder, SANDBOX, "close", input, &result);
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::replaying::ReplayingSandbox;
    use crate::adapters::scripted::ScriptedSandbox;
    use crate::cassette::replayer::CassetteReplayer;
    use crate::cassette::session::RecordingSession;
    use crate::cassette::config::CassetteConfig;

    #[tokio::test]
    async fn recorded_session_replays_identically() {
        let root = tempfile::tempdir().unwrap();
        let session = RecordingSession::new(root.path()).unwrap();
        let sandbox =
            RecordingSandbox::new(Box::new(ScriptedSandbox::healthy()), session.recorder(SANDBOX));

        assert!(sandbox.is_available());
        let live = sandbox.open(Duration::from_secs(10)).await.unwrap();
        let check = CommandSpec::new("python3 -c 'urlopen'", 5);
        let live_output = live.run(&check).await.unwrap();
        let live_host = live.host(8000);
        live.close().await.unwrap();
        drop(live);
        drop(sandbox);

        let dir = session.finish().unwrap();
        let path = CassetteConfig::from_dir(&dir).sandbox.unwrap();
        let replayer: CassetteReplayer = CassetteConfig::load(&path).unwrap();
        let replay = ReplayingSandbox::new(replayer);

        assert!(replay.is_available());
        let session = replay.open(Duration::from_secs(10)).await.unwrap();
        assert_eq!(session.id(), "sbx1");
        assert_eq!(session.run(&check).await.unwrap(), live_output);
        assert_eq!(session.host(8000), live_host);
        session.close().await.unwrap();
    }
}
