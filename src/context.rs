//! Service context bundling all port trait objects.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::adapters::live::{
    GeminiClient, GitHubClient, LiveClock, LiveFileSystem, LiveIdGenerator, RemoteSandbox,
};
use crate::adapters::recording::{
    RecordingClock, RecordingFileSystem, RecordingIdGenerator, RecordingLlmClient,
    RecordingPublisher, RecordingRepository, RecordingSandbox,
};
use crate::adapters::replaying::{
    ReplayingClock, ReplayingFileSystem, ReplayingIdGenerator, ReplayingLlmClient,
    ReplayingPublisher, ReplayingRepository, ReplayingSandbox,
};
use crate::cassette::config::CassetteConfig;
use crate::cassette::ports;
use crate::cassette::session::RecordingSession;
use crate::config::Settings;
use crate::model::FileRecord;
use crate::ports::llm::{CompletionRequest, LlmError, LlmFuture};
use crate::ports::{
    Clock, FileSystem, IdGenerator, LlmClient, PortError, PortFuture, PublishOutcome,
    PullRequestPublisher, RepoRef, RepoTree, RepositoryReader, SandboxProvider, SandboxSession,
    TreeEntry,
};

/// Bundles all port trait objects into a single context.
///
/// Each field provides access to one external boundary. Constructors
/// wire up different adapter implementations (live, recording, replaying).
pub struct ServiceContext {
    /// Clock for memory timestamps.
    pub clock: Box<dyn Clock>,
    /// Filesystem holding the memory logs.
    pub fs: Box<dyn FileSystem>,
    /// Run identifiers.
    pub id_gen: Box<dyn IdGenerator>,
    /// Generation backend.
    pub llm: Box<dyn LlmClient>,
    /// Source repository reader.
    pub repo: Box<dyn RepositoryReader>,
    /// Pull-request publisher.
    pub publisher: Box<dyn PullRequestPublisher>,
    /// Remote execution sandbox.
    pub sandbox: Box<dyn SandboxProvider>,
    recording: RecordingGuard,
}

/// Writes the cassettes of an unfinished recording when dropped.
#[derive(Default)]
struct RecordingGuard(Option<RecordingSession>);

impl Drop for RecordingGuard {
    fn drop(&mut self) {
        if let Some(session) = self.0.take() {
            match session.finish() {
                Ok(dir) => info!(dir = %dir.display(), "cassettes written"),
                Err(e) => warn!(error = %e, "failed to write cassettes"),
            }
        }
    }
}

fn github(settings: &Settings) -> GitHubClient {
    GitHubClient::new(
        &settings.github_api_url,
        &settings.github_raw_url,
        settings.github_token.clone(),
    )
}

impl ServiceContext {
    /// A context talking to the real services configured in `settings`.
    #[must_use]
    pub fn live(settings: &Settings) -> Self {
        Self {
            clock: Box::new(LiveClock),
            fs: Box::new(LiveFileSystem),
            id_gen: Box::new(LiveIdGenerator),
            llm: Box::new(GeminiClient::new(
                &settings.llm_base_url,
                settings.gemini_api_key.clone(),
            )),
            repo: Box::new(github(settings)),
            publisher: Box::new(github(settings)),
            sandbox: Box::new(RemoteSandbox::new(
                &settings.sandbox_url,
                &settings.sandbox_domain,
                settings.sandbox_api_key.clone(),
            )),
            recording: RecordingGuard::default(),
        }
    }

    /// A live context that records every port call under `<root>/<timestamp>/`.
    ///
    /// The cassettes are written by [`ServiceContext::finish`], or on drop.
    /// This is the developer-only mechanism behind `REVIVE_RECORD`.
    ///
    /// # Errors
    ///
    /// Returns an error if the recording directory cannot be created.
    pub fn recording_at(root: &Path, settings: &Settings) -> Result<Self, String> {
        let session = RecordingSession::new(root)?;
        let live = Self::live(settings);
        Ok(Self {
            clock: Box::new(RecordingClock::new(live.clock, session.recorder(ports::CLOCK))),
            fs: Box::new(RecordingFileSystem::new(live.fs, session.recorder(ports::FS))),
            id_gen: Box::new(RecordingIdGenerator::new(
                live.id_gen,
                session.recorder(ports::ID_GEN),
            )),
            llm: Box::new(RecordingLlmClient::new(live.llm, session.recorder(ports::LLM))),
            repo: Box::new(RecordingRepository::new(live.repo, session.recorder(ports::REPO))),
            publisher: Box::new(RecordingPublisher::new(
                live.publisher,
                session.recorder(ports::PUBLISHER),
            )),
            sandbox: Box::new(RecordingSandbox::new(
                live.sandbox,
                session.recorder(ports::SANDBOX),
            )),
            recording: RecordingGuard(Some(session)),
        })
    }

    /// A context replaying the per-port cassettes found in a recording directory.
    ///
    /// # Errors
    ///
    /// Returns an error if a cassette in `dir` cannot be read or parsed.
    pub fn replaying(dir: &Path) -> Result<Self, String> {
        Self::replaying_from(&CassetteConfig::from_dir(dir))
    }

    /// Creates a replaying context from per-port cassette files.
    ///
    /// Ports without a configured cassette get an adapter that fails with
    /// a clear message when called.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured cassette file cannot be read or parsed.
    pub fn replaying_from(config: &CassetteConfig) -> Result<Self, String> {
        let replayers = config.load_all()?;
        Ok(Self {
            clock: match replayers.clock {
                Some(r) => Box::new(ReplayingClock::new(r)),
                None => Box::new(Unconfigured(ports::CLOCK)),
            },
            fs: match replayers.fs {
                Some(r) => Box::new(ReplayingFileSystem::new(r)),
                None => Box::new(Unconfigured(ports::FS)),
            },
            id_gen: match replayers.id_gen {
                Some(r) => Box::new(ReplayingIdGenerator::new(r)),
                None => Box::new(Unconfigured(ports::ID_GEN)),
            },
            llm: match replayers.llm {
                Some(r) => Box::new(ReplayingLlmClient::new(r)),
                None => Box::new(Unconfigured(ports::LLM)),
            },
            repo: match replayers.repo {
                Some(r) => Box::new(ReplayingRepository::new(r)),
                None => Box::new(Unconfigured(ports::REPO)),
            },
            publisher: match replayers.publisher {
                Some(r) => Box::new(ReplayingPublisher::new(r)),
                None => Box::new(Unconfigured(ports::PUBLISHER)),
            },
            sandbox: match replayers.sandbox {
                Some(r) => Box::new(ReplayingSandbox::new(r)),
                None => Box::new(Unconfigured(ports::SANDBOX)),
            },
            recording: RecordingGuard::default(),
        })
    }

    /// A context over in-memory test doubles; memory logs go to the real filesystem.
    #[cfg(test)]
    pub(crate) fn scripted(
        llm: impl LlmClient + 'static,
        repo: impl RepositoryReader + 'static,
        sandbox: impl SandboxProvider + 'static,
    ) -> Self {
        use crate::adapters::scripted::{FixedClock, SequentialIds};
        use chrono::TimeZone;

        Self {
            clock: Box::new(FixedClock(
                chrono::Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap(),
            )),
            fs: Box::new(LiveFileSystem),
            id_gen: Box::new(SequentialIds::default()),
            llm: Box::new(llm),
            repo: Box::new(repo),
            publisher: Box::new(Unconfigured(ports::PUBLISHER)),
            sandbox: Box::new(sandbox),
            recording: RecordingGuard::default(),
        }
    }

    /// Writes any recorded cassettes, returning their directory.
    ///
    /// # Errors
    ///
    /// Returns an error if a cassette cannot be written.
    pub fn finish(mut self) -> Result<Option<PathBuf>, String> {
        self.recording.0.take().map(RecordingSession::finish).transpose()
    }
}

/// Stand-in for a port that has no cassette during replay.
///
/// Fallible calls return an error naming the port. The clock and id
/// generator cannot fail, so they panic; the sandbox reports itself
/// unavailable.
struct Unconfigured(&'static str);

impl Unconfigured {
    fn message(&self) -> String {
        format!("no cassette recorded for the {} port", self.0)
    }

    fn error(&self) -> PortError {
        self.message().into()
    }
}

impl Clock for Unconfigured {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        panic!("{}", self.message());
    }
}

impl IdGenerator for Unconfigured {
    fn run_id(&self) -> String {
        panic!("{}", self.message());
    }
}

impl FileSystem for Unconfigured {
    fn read_optional(&self, _path: &Path) -> Result<Option<String>, PortError> {
        Err(self.error())
    }

    fn write(&self, _path: &Path, _contents: &str) -> Result<(), PortError> {
        Err(self.error())
    }
}

impl LlmClient for Unconfigured {
    fn complete(&self, _request: &CompletionRequest) -> LlmFuture<'_> {
        let message = self.message();
        Box::pin(async move { Err(LlmError::Transport { message }) })
    }
}

impl RepositoryReader for Unconfigured {
    fn default_branch<'a>(&'a self, _repo: &'a RepoRef) -> PortFuture<'a, String> {
        Box::pin(async move { Err(self.error()) })
    }

    fn tree<'a>(&'a self, _repo: &'a RepoRef, _branch: &'a str) -> PortFuture<'a, RepoTree> {
        Box::pin(async move { Err(self.error()) })
    }

    fn fetch_file<'a>(
        &'a self,
        _repo: &'a RepoRef,
        _branch: &'a str,
        _entry: &'a TreeEntry,
    ) -> PortFuture<'a, Option<String>> {
        Box::pin(async move { Err(self.error()) })
    }
}

impl PullRequestPublisher for Unconfigured {
    fn commit_file<'a>(
        &'a self,
        _repo: &'a RepoRef,
        _path: &'a str,
        _content: &'a str,
    ) -> PortFuture<'a, PublishOutcome> {
        Box::pin(async move { Err(self.error()) })
    }

    fn publish_files<'a>(
        &'a self,
        _repo: &'a RepoRef,
        _files: &'a [FileRecord],
    ) -> PortFuture<'a, PublishOutcome> {
        Box::pin(async move { Err(self.error()) })
    }
}

impl SandboxProvider for Unconfigured {
    fn is_available(&self) -> bool {
        false
    }

    fn open(&self, _lifetime: Duration) -> PortFuture<'_, Box<dyn SandboxSession>> {
        Box::pin(async move { Err(self.error()) })
    }
}
